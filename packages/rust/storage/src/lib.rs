//! File-backed persistence for GCN Watch.
//!
//! Two stores, each the sole writer of its file:
//! - [`Ledger`]: newline-delimited circular IDs, append-only
//! - [`ResultStore`]: a pretty-printed JSON array of
//!   [`ExtractionRecord`](gcnwatch_shared::ExtractionRecord)s, rewritten
//!   atomically on every save
//!
//! Both return [`Result`](gcnwatch_shared::Result); the monitor decides
//! whether a failure is worth more than a log line.

mod ledger;
mod results;

pub use ledger::Ledger;
pub use results::ResultStore;
