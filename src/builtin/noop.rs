//! Simulated backend that pretends to provision hosts.

use tracing::debug;

use crate::backend::{BackendContext, BackendFuture, Hypervisor};
use crate::error::HypervisorError;

/// Backend that marks hosts as provisioned without creating anything.
///
/// Hosts without a hypervisor hostname receive their inventory name so that
/// connection resolution behaves as it would against a real backend.
#[derive(Clone, Debug)]
pub struct NoopHypervisor {
    context: BackendContext,
}

impl NoopHypervisor {
    /// Wraps `context`.
    #[must_use]
    pub const fn new(context: BackendContext) -> Self {
        Self { context }
    }
}

impl Hypervisor for NoopHypervisor {
    fn context(&self) -> &BackendContext {
        &self.context
    }

    fn provision(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async move {
            self.context.hosts().update(|host| {
                if host.vmhostname.is_none() {
                    host.vmhostname = Some(host.name.clone());
                }
                debug!(host = %host.name, "noop provision");
            });
            self.context.logger().notify(&format!(
                "noop: {} host(s) marked as provisioned",
                self.context.hosts().len()
            ));
            Ok(())
        })
    }

    fn cleanup(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async move {
            self.context.logger().notify("noop: nothing to clean up");
            Ok(())
        })
    }
}
