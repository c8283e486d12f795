//! Backends that ship with the crate.
//!
//! - [`DefaultHypervisor`]: registered as `default` and `none`; uses every
//!   trait default, so it provisions nothing.
//! - [`NoopHypervisor`]: registered as `noop`; simulates provisioning.
//! - [`DockerHypervisor`]: registered as `docker`; runs one container per host.

mod docker;
mod noop;

pub use docker::{DockerHypervisor, RUN_LABEL};
pub use noop::NoopHypervisor;

use crate::backend::{BackendContext, Hypervisor};

/// Identity backend used when no real hypervisor is selected.
#[derive(Clone, Debug)]
pub struct DefaultHypervisor {
    context: BackendContext,
}

impl DefaultHypervisor {
    /// Wraps `context` without provisioning anything.
    #[must_use]
    pub const fn new(context: BackendContext) -> Self {
        Self { context }
    }
}

impl Hypervisor for DefaultHypervisor {
    fn context(&self) -> &BackendContext {
        &self.context
    }
}
