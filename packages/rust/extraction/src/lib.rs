//! LLM extraction of observational facts from GCN circular text.
//!
//! [`ExtractionEngine::extract`] always returns an
//! [`ExtractionRecord`](gcnwatch_shared::ExtractionRecord): failures are
//! captured in the record rather than propagated, so a misbehaving model can
//! never stop the monitor.

mod engine;
mod error;
pub mod prompt;
pub mod response;
pub mod schema;

pub use engine::ExtractionEngine;
pub use error::InferenceError;
pub use response::InferenceResponse;
