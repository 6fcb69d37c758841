//! Best-effort progress narration during a fetch.

use tracing::info;

/// Receives progress messages. Implementations must not fail the fetch.
pub trait StatusReporter: Send {
    fn set_status(&self, message: &str);

    fn clear(&self);
}

/// Narrates through `tracing` at info level.
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn set_status(&self, message: &str) {
        info!(target: "quotegrid::status", "{message}");
    }

    fn clear(&self) {}
}

/// Discards everything.
pub struct NullReporter;

impl StatusReporter for NullReporter {
    fn set_status(&self, _message: &str) {}

    fn clear(&self) {}
}
