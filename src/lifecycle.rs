//! Creates, configures, and tears down backends.
//!
//! [`HypervisorLifecycle`] is the entry point callers use: it resolves the
//! requested backend through the [`BackendRegistry`], installs the backend's
//! SSH connection preference on every host, and optionally provisions before
//! handing the backend back.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{BackendContext, Hypervisor};
use crate::connection::set_ssh_connection_preference;
use crate::error::HypervisorError;
use crate::host::HostSet;
use crate::logger::Logger;
use crate::options::{HypervisorOptions, StepOptions};
use crate::pipeline::ConfigurationPipeline;
use crate::registry::BackendRegistry;
use crate::steps::HostSteps;

/// Drives backends through their lifecycle.
#[derive(Clone, Debug)]
pub struct HypervisorLifecycle {
    registry: BackendRegistry,
    steps: Arc<dyn HostSteps>,
    logger: Arc<dyn Logger>,
}

impl HypervisorLifecycle {
    /// Creates a lifecycle resolving backends through `registry`.
    #[must_use]
    pub const fn new(
        registry: BackendRegistry,
        steps: Arc<dyn HostSteps>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            registry,
            steps,
            logger,
        }
    }

    /// Registry used to resolve backend types.
    #[must_use]
    pub const fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Creates the backend for `backend_type` over `hosts`.
    ///
    /// The backend's connection preference is validated and assigned to
    /// every host before anything else happens. When `options.provision` is
    /// set the backend is provisioned before it is returned.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::InvalidBackend`] for unknown types,
    /// [`HypervisorError::ContractViolation`] when the backend declares an
    /// invalid preference, and any error raised while provisioning.
    pub async fn create(
        &self,
        backend_type: &str,
        hosts: &HostSet,
        options: HypervisorOptions,
    ) -> Result<Box<dyn Hypervisor>, HypervisorError> {
        self.logger
            .notify(&format!("found some {backend_type} boxes to create"));

        let provision = options.provision;
        let context = BackendContext::new(
            backend_type,
            hosts.clone(),
            options,
            Arc::clone(&self.steps),
            Arc::clone(&self.logger),
        );
        let backend = self.registry.instantiate(context)?;
        set_ssh_connection_preference(hosts, &backend.connection_preference())?;

        if provision {
            info!(backend = backend_type, hosts = hosts.len(), "provisioning hosts");
            backend.provision().await?;
        } else {
            debug!(backend = backend_type, "provisioning deferred");
        }
        Ok(backend)
    }

    /// Proxies package managers, configures, then validates the hosts of
    /// `backend`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`HypervisorError`] raised by any phase.
    pub async fn configure(
        &self,
        backend: &dyn Hypervisor,
        step_options: &StepOptions,
    ) -> Result<(), HypervisorError> {
        let context = backend.context();
        self.logger.notify(&format!(
            "configuring {} {} host(s)",
            context.hosts().len(),
            context.backend_type()
        ));
        ConfigurationPipeline::new(context)
            .proxy_package_manager()
            .await?;
        backend.configure(step_options).await?;
        backend.validate().await
    }

    /// Releases everything `backend` provisioned.
    ///
    /// # Errors
    ///
    /// Returns the error raised by the backend's cleanup.
    pub async fn teardown(&self, backend: &dyn Hypervisor) -> Result<(), HypervisorError> {
        self.logger.notify(&format!(
            "cleaning up {} boxes",
            backend.context().backend_type()
        ));
        backend.cleanup().await
    }
}
