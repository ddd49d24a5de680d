//! Outbound notifications for new extraction records.
//!
//! The monitor only needs to know whether a notification went out; delivery
//! failures are logged here and never surface as errors.

mod slack;

use std::future::Future;

use gcnwatch_shared::ExtractionRecord;

pub use slack::{SlackNotifier, format_message};

/// Sink for freshly created records.
pub trait Notifier {
    /// Deliver `record`. Returns `true` if the message was accepted.
    fn notify(&self, record: &ExtractionRecord) -> impl Future<Output = bool> + Send;
}

/// Notifier that drops everything. Used when no sink is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn notify(&self, _record: &ExtractionRecord) -> bool {
        false
    }
}
