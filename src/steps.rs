//! Host configuration steps.
//!
//! The pipeline decides whether, in which order, and with what parallelism the
//! steps run; what each step does to a host is left to a [`HostSteps`]
//! implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::info;

use crate::host::Host;
use crate::options::HypervisorOptions;

/// Future returned by configuration steps.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StepError>> + Send + 'a>>;

/// Identifies a configuration step.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StepKind {
    /// Per-host time synchronisation.
    Timesync,
    /// Root SSH key distribution.
    RootKeys,
    /// Extra EL-family package installation.
    AddElExtras,
    /// Firewall rule removal.
    DisableIptables,
    /// Environment variable injection.
    SetEnv,
    /// OS update suppression.
    DisableUpdates,
    /// Package manager proxy setup.
    PackageProxy,
    /// Host validation.
    ValidateHost,
}

impl StepKind {
    /// Returns the step's short name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timesync => "timesync",
            Self::RootKeys => "root_keys",
            Self::AddElExtras => "add_el_extras",
            Self::DisableIptables => "disable_iptables",
            Self::SetEnv => "set_env",
            Self::DisableUpdates => "disable_updates",
            Self::PackageProxy => "package_proxy",
            Self::ValidateHost => "validate_host",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a configuration step.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{step} step failed{}: {message}", .host.as_ref().map(|name| format!(" on {name}")).unwrap_or_default())]
pub struct StepError {
    /// Step that failed.
    pub step: StepKind,
    /// Host the step was running against, for per-host steps.
    pub host: Option<String>,
    /// Human-readable failure description.
    pub message: String,
}

impl StepError {
    /// Creates an error for a step that ran against the whole host set.
    #[must_use]
    pub fn global(step: StepKind, message: impl Into<String>) -> Self {
        Self {
            step,
            host: None,
            message: message.into(),
        }
    }

    /// Creates an error for a step that ran against a single host.
    #[must_use]
    pub fn on_host(step: StepKind, host: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step,
            host: Some(host.into()),
            message: message.into(),
        }
    }
}

/// Implementations of the individual configuration steps.
pub trait HostSteps: fmt::Debug + Send + Sync {
    /// Synchronises the clock of a single host.
    fn timesync<'a>(&'a self, host: &'a Host, options: &'a HypervisorOptions) -> StepFuture<'a>;

    /// Distributes root SSH keys across `hosts`.
    fn sync_root_keys<'a>(
        &'a self,
        hosts: &'a [Host],
        options: &'a HypervisorOptions,
    ) -> StepFuture<'a>;

    /// Installs extra packages on EL-family hosts.
    fn add_el_extras<'a>(
        &'a self,
        hosts: &'a [Host],
        options: &'a HypervisorOptions,
    ) -> StepFuture<'a>;

    /// Disables firewall rules.
    fn disable_iptables<'a>(
        &'a self,
        hosts: &'a [Host],
        options: &'a HypervisorOptions,
    ) -> StepFuture<'a>;

    /// Injects environment variables.
    fn set_env<'a>(&'a self, hosts: &'a [Host], options: &'a HypervisorOptions)
    -> StepFuture<'a>;

    /// Disables OS update mechanisms.
    fn disable_updates<'a>(
        &'a self,
        hosts: &'a [Host],
        options: &'a HypervisorOptions,
    ) -> StepFuture<'a>;

    /// Points host package managers at `proxy`.
    fn package_proxy<'a>(
        &'a self,
        hosts: &'a [Host],
        proxy: &'a str,
        options: &'a HypervisorOptions,
    ) -> StepFuture<'a>;

    /// Checks that hosts meet the requirements of a test node.
    fn validate_host<'a>(
        &'a self,
        hosts: &'a [Host],
        options: &'a HypervisorOptions,
    ) -> StepFuture<'a>;
}

/// A step the dry-run implementation would have executed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlannedStep {
    /// Step name.
    pub step: StepKind,
    /// Hosts the step targets.
    pub hosts: Vec<String>,
}

impl fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.hosts.join(", "))
    }
}

/// Step implementation that performs nothing and records the plan.
#[derive(Clone, Debug, Default)]
pub struct DryRunSteps {
    planned: Arc<Mutex<Vec<PlannedStep>>>,
}

impl DryRunSteps {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded steps in execution order.
    #[must_use]
    pub fn planned(&self) -> Vec<PlannedStep> {
        self.planned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record<'a>(&'a self, step: StepKind, hosts: &'a [Host]) -> StepFuture<'a> {
        Box::pin(async move {
            let names: Vec<String> = hosts.iter().map(|host| host.name.clone()).collect();
            info!(step = %step, hosts = ?names, "dry run");
            self.planned
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(PlannedStep { step, hosts: names });
            Ok(())
        })
    }
}

impl HostSteps for DryRunSteps {
    fn timesync<'a>(&'a self, host: &'a Host, _options: &'a HypervisorOptions) -> StepFuture<'a> {
        self.record(StepKind::Timesync, std::slice::from_ref(host))
    }

    fn sync_root_keys<'a>(
        &'a self,
        hosts: &'a [Host],
        _options: &'a HypervisorOptions,
    ) -> StepFuture<'a> {
        self.record(StepKind::RootKeys, hosts)
    }

    fn add_el_extras<'a>(
        &'a self,
        hosts: &'a [Host],
        _options: &'a HypervisorOptions,
    ) -> StepFuture<'a> {
        self.record(StepKind::AddElExtras, hosts)
    }

    fn disable_iptables<'a>(
        &'a self,
        hosts: &'a [Host],
        _options: &'a HypervisorOptions,
    ) -> StepFuture<'a> {
        self.record(StepKind::DisableIptables, hosts)
    }

    fn set_env<'a>(
        &'a self,
        hosts: &'a [Host],
        _options: &'a HypervisorOptions,
    ) -> StepFuture<'a> {
        self.record(StepKind::SetEnv, hosts)
    }

    fn disable_updates<'a>(
        &'a self,
        hosts: &'a [Host],
        _options: &'a HypervisorOptions,
    ) -> StepFuture<'a> {
        self.record(StepKind::DisableUpdates, hosts)
    }

    fn package_proxy<'a>(
        &'a self,
        hosts: &'a [Host],
        _proxy: &'a str,
        _options: &'a HypervisorOptions,
    ) -> StepFuture<'a> {
        self.record(StepKind::PackageProxy, hosts)
    }

    fn validate_host<'a>(
        &'a self,
        hosts: &'a [Host],
        _options: &'a HypervisorOptions,
    ) -> StepFuture<'a> {
        self.record(StepKind::ValidateHost, hosts)
    }
}
