//! Host configuration pipeline.
//!
//! Configuration runs in two stages. Time synchronisation runs per host, either
//! one host after another or concurrently across the whole set. Once every
//! host has been handled, the global steps run in a fixed order, each gated by
//! its own option. The first failure aborts the pipeline and is returned to the
//! caller unchanged.

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::backend::BackendContext;
use crate::error::HypervisorError;
use crate::host::Host;
use crate::options::{CONFIGURE_PHASE, HypervisorOptions, StepOptions, run_in_parallel};
use crate::steps::{HostSteps, StepError, StepKind};

/// Runs configuration steps against the hosts of a backend context.
#[derive(Clone, Copy, Debug)]
pub struct ConfigurationPipeline<'a> {
    context: &'a BackendContext,
}

impl<'a> ConfigurationPipeline<'a> {
    /// Creates a pipeline over `context`.
    #[must_use]
    pub const fn new(context: &'a BackendContext) -> Self {
        Self { context }
    }

    /// Runs the configuration steps when the `configure` option is set.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::Step`] carrying the first step failure.
    pub async fn configure(self, step_options: &StepOptions) -> Result<(), HypervisorError> {
        let options = self.context.options();
        if !options.configure {
            debug!("configuration disabled; skipping pipeline");
            return Ok(());
        }

        let hosts = self.context.hosts().snapshot();
        let steps = self.context.steps();

        if run_in_parallel(step_options, options, CONFIGURE_PHASE) {
            timesync_parallel(steps, &hosts, options).await?;
        } else {
            timesync_sequential(steps, &hosts, options).await?;
        }

        if options.root_keys {
            announce(StepKind::RootKeys, &hosts);
            steps.sync_root_keys(&hosts, options).await?;
        }
        if options.add_el_extras {
            announce(StepKind::AddElExtras, &hosts);
            steps.add_el_extras(&hosts, options).await?;
        }
        if options.disable_iptables {
            announce(StepKind::DisableIptables, &hosts);
            steps.disable_iptables(&hosts, options).await?;
        }
        if options.set_env {
            announce(StepKind::SetEnv, &hosts);
            steps.set_env(&hosts, options).await?;
        }
        if options.disable_updates {
            announce(StepKind::DisableUpdates, &hosts);
            steps.disable_updates(&hosts, options).await?;
        }

        Ok(())
    }

    /// Points host package managers at the configured proxy, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::Step`] when the proxy step fails.
    pub async fn proxy_package_manager(self) -> Result<(), HypervisorError> {
        let options = self.context.options();
        let Some(proxy) = options.package_proxy.as_deref() else {
            return Ok(());
        };

        let hosts = self.context.hosts().snapshot();
        info!(proxy, hosts = hosts.len(), "configuring package proxy");
        self.context
            .steps()
            .package_proxy(&hosts, proxy, options)
            .await?;
        Ok(())
    }

    /// Validates the hosts when the `validate` option is set.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::Step`] when host validation fails.
    pub async fn validate(self) -> Result<(), HypervisorError> {
        let options = self.context.options();
        if !options.validate {
            return Ok(());
        }

        let hosts = self.context.hosts().snapshot();
        info!(hosts = hosts.len(), "validating hosts");
        self.context.steps().validate_host(&hosts, options).await?;
        Ok(())
    }
}

fn announce(step: StepKind, hosts: &[Host]) {
    info!(step = %step, hosts = hosts.len(), "running configuration step");
}

async fn timesync_sequential(
    steps: &dyn HostSteps,
    hosts: &[Host],
    options: &HypervisorOptions,
) -> Result<(), StepError> {
    for host in hosts.iter().filter(|host| host.timesync) {
        debug!(host = %host.name, "synchronising time");
        steps.timesync(host, options).await?;
    }
    Ok(())
}

/// Runs every host's time sync concurrently and waits for all of them before
/// reporting. When several hosts fail, the failure of the host that comes
/// first in the collection is returned.
async fn timesync_parallel(
    steps: &dyn HostSteps,
    hosts: &[Host],
    options: &HypervisorOptions,
) -> Result<(), StepError> {
    let pending = hosts
        .iter()
        .filter(|host| host.timesync)
        .map(|host| steps.timesync(host, options));
    let results = join_all(pending).await;
    debug!(hosts = results.len(), "parallel time sync finished");
    results.into_iter().collect()
}
