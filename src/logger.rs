//! Notification sink injected into the lifecycle.

use std::fmt::Debug;

use tracing::{info, warn};

/// Receives user-facing progress notifications.
pub trait Logger: Debug + Send + Sync {
    /// Reports normal progress.
    fn notify(&self, message: &str);

    /// Reports a recoverable problem.
    fn warn(&self, message: &str);
}

/// Forwards notifications to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn notify(&self, message: &str) {
        info!(target: "hostforge::notify", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(target: "hostforge::notify", "{message}");
    }
}
