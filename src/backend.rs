//! Backend abstraction shared by every hypervisor.
//!
//! A backend exposes exactly five operations. Provisioning and cleanup default
//! to no-ops, configuration and validation default to the shared
//! [`ConfigurationPipeline`], and the connection preference defaults to the
//! canonical order, so a backend only overrides what it changes.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::connection::{ConnectionField, DEFAULT_CONNECTION_PREFERENCE};
use crate::error::HypervisorError;
use crate::host::HostSet;
use crate::logger::Logger;
use crate::options::{HypervisorOptions, StepOptions};
use crate::pipeline::ConfigurationPipeline;
use crate::steps::HostSteps;

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Everything a backend instance holds for the duration of one lifecycle.
#[derive(Clone, Debug)]
pub struct BackendContext {
    backend_type: String,
    hosts: HostSet,
    options: HypervisorOptions,
    steps: Arc<dyn HostSteps>,
    logger: Arc<dyn Logger>,
}

impl BackendContext {
    /// Bundles the inputs of one `create` call.
    #[must_use]
    pub fn new(
        backend_type: impl Into<String>,
        hosts: HostSet,
        options: HypervisorOptions,
        steps: Arc<dyn HostSteps>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            backend_type: backend_type.into(),
            hosts,
            options,
            steps,
            logger,
        }
    }

    /// Type identifier the backend was created for.
    #[must_use]
    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    /// Hosts managed by the backend.
    #[must_use]
    pub const fn hosts(&self) -> &HostSet {
        &self.hosts
    }

    /// Options supplied by the caller.
    #[must_use]
    pub const fn options(&self) -> &HypervisorOptions {
        &self.options
    }

    /// Configuration step implementations.
    #[must_use]
    pub fn steps(&self) -> &dyn HostSteps {
        self.steps.as_ref()
    }

    /// Notification sink.
    #[must_use]
    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// Generates a random host name honouring `host_name_prefix`.
    #[must_use]
    pub fn generate_host_name(&self) -> String {
        self.options.host_name_generator().generate()
    }
}

/// Interface implemented by every hypervisor backend.
pub trait Hypervisor: Debug + Send + Sync {
    /// Returns the context the backend was created with.
    fn context(&self) -> &BackendContext;

    /// Creates the machines backing the hosts. Defaults to a no-op.
    fn provision(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async { Ok(()) })
    }

    /// Releases everything `provision` created. Defaults to a no-op.
    fn cleanup(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async { Ok(()) })
    }

    /// Runs the configuration pipeline against the provisioned hosts.
    fn configure<'a>(
        &'a self,
        step_options: &'a StepOptions,
    ) -> BackendFuture<'a, (), HypervisorError> {
        Box::pin(ConfigurationPipeline::new(self.context()).configure(step_options))
    }

    /// Validates that the hosts are usable test nodes.
    fn validate(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(ConfigurationPipeline::new(self.context()).validate())
    }

    /// Identity fields to try, in order, when connecting over SSH. Overrides
    /// may reorder the canonical fields but must not add or drop any.
    fn connection_preference(&self) -> Vec<ConnectionField> {
        DEFAULT_CONNECTION_PREFERENCE.to_vec()
    }
}
