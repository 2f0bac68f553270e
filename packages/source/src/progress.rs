//! Progress reporting for long-running fetches.
//!
//! [`ProgressCallback`] decouples the ingestion loop from whatever renders
//! progress (an `indicatif` bar in the CLI, nothing in tests). The fetch
//! loop reports the number of days up front and advances one day at a
//! time, updating the message with the running record count.

use std::sync::Arc;

/// Receives progress updates from a running fetch.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// [`Arc`].
pub trait ProgressCallback: Send + Sync {
    /// Sets the total expected units of work (days in the window).
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
