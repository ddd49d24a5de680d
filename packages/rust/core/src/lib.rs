//! Polling and extraction orchestration for GCN Watch.
//!
//! Ties the circular sources, the extraction engine, the stores, and the
//! notifier together into the long-running [`Monitor`] and the one-off
//! [`inspect_circular`] debug path.

pub mod inspect;
pub mod monitor;
pub mod processor;

pub use inspect::{ProgressReporter, SilentProgress, inspect_circular, parse_target};
pub use monitor::{CycleReport, ItemAction, Monitor, classify_reference};
pub use processor::CircularProcessor;
