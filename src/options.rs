//! Run options loaded via `ortho-config`.
//!
//! [`HypervisorOptions`] is the option map every backend receives. Values
//! merge defaults, `hostforge.toml`, and `HOSTFORGE_*` environment variables.
//! [`StepOptions`] carries per-call overrides for a single pipeline phase.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::host_name::HostNameGenerator;

/// Phase name used to opt the configuration pipeline into parallel mode.
pub const CONFIGURE_PHASE: &str = "configure";

/// Default image for container hosts that do not name one.
pub const DEFAULT_DOCKER_IMAGE: &str = "ubuntu:24.04";

/// Options shared by the lifecycle, the backends, and the configuration
/// pipeline.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HOSTFORGE",
    discovery(
        app_name = "hostforge",
        env_var = "HOSTFORGE_CONFIG_PATH",
        config_file_name = "hostforge.toml",
        dotfile_name = ".hostforge.toml",
        project_file_name = "hostforge.toml"
    )
)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "each configuration step is gated by its own user-facing toggle"
)]
pub struct HypervisorOptions {
    /// Provision hosts immediately after the backend is created.
    #[ortho_config(default = false)]
    pub provision: bool,
    /// Master switch for the configuration pipeline.
    #[ortho_config(default = false)]
    pub configure: bool,
    /// Master switch for post-configuration host validation.
    #[ortho_config(default = false)]
    pub validate: bool,
    /// Distribute root SSH keys across hosts.
    #[ortho_config(default = false)]
    pub root_keys: bool,
    /// Install extra packages on EL-family hosts.
    #[ortho_config(default = false)]
    pub add_el_extras: bool,
    /// Disable host firewall rules.
    #[ortho_config(default = false)]
    pub disable_iptables: bool,
    /// Inject environment variables into host sessions.
    #[ortho_config(default = false)]
    pub set_env: bool,
    /// Disable OS update mechanisms.
    #[ortho_config(default = false)]
    pub disable_updates: bool,
    /// Proxy URL for host package managers.
    pub package_proxy: Option<String>,
    /// Prefix applied to generated host names.
    pub host_name_prefix: Option<String>,
    /// Phases allowed to run across hosts in parallel, e.g. `configure`.
    #[serde(default)]
    pub run_in_parallel: Vec<String>,
    /// Image used by the container backend when a host names none.
    #[ortho_config(default = DEFAULT_DOCKER_IMAGE.to_owned())]
    pub docker_image: String,
    /// Container engine CLI used by the container backend.
    #[ortho_config(default = "docker".to_owned())]
    pub docker_bin: String,
}

impl Default for HypervisorOptions {
    fn default() -> Self {
        Self {
            provision: false,
            configure: false,
            validate: false,
            root_keys: false,
            add_el_extras: false,
            disable_iptables: false,
            set_env: false,
            disable_updates: false,
            package_proxy: None,
            host_name_prefix: None,
            run_in_parallel: Vec::new(),
            docker_image: DEFAULT_DOCKER_IMAGE.to_owned(),
            docker_bin: String::from("docker"),
        }
    }
}

impl HypervisorOptions {
    /// Loads options without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, OptionsError> {
        Self::load_from_iter([OsString::from("hostforge")])
            .map_err(|err| OptionsError::Parse(err.to_string()))
    }

    /// Checks that optional string values are not blank.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::InvalidField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), OptionsError> {
        Self::require_optional_value(self.package_proxy.as_deref(), "package_proxy")?;
        Self::require_optional_value(self.host_name_prefix.as_deref(), "host_name_prefix")?;
        Self::require_optional_value(Some(&self.docker_image), "docker_image")?;
        Self::require_optional_value(Some(&self.docker_bin), "docker_bin")?;
        if self.run_in_parallel.iter().any(|phase| phase.trim().is_empty()) {
            return Err(OptionsError::InvalidField {
                field: String::from("run_in_parallel"),
            });
        }
        Ok(())
    }

    /// Returns `true` when `phase` is listed in `run_in_parallel`.
    #[must_use]
    pub fn parallel_phase(&self, phase: &str) -> bool {
        self.run_in_parallel.iter().any(|entry| entry.trim() == phase)
    }

    /// Returns a host name generator honouring `host_name_prefix`.
    #[must_use]
    pub fn host_name_generator(&self) -> HostNameGenerator {
        HostNameGenerator::new(self.host_name_prefix.clone())
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), OptionsError> {
        match value {
            Some(v) if v.trim().is_empty() => Err(OptionsError::InvalidField {
                field: field.to_owned(),
            }),
            _ => Ok(()),
        }
    }
}

/// Per-call options for a pipeline phase.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StepOptions {
    /// Overrides the pipeline-wide parallel setting for this call.
    pub run_in_parallel: Option<bool>,
}

impl StepOptions {
    /// Forces sequential or parallel execution for this call.
    #[must_use]
    pub const fn parallel(run_in_parallel: bool) -> Self {
        Self {
            run_in_parallel: Some(run_in_parallel),
        }
    }
}

/// Decides whether `phase` runs in parallel: the per-call override wins,
/// otherwise the phase must be listed in the pipeline-wide options.
#[must_use]
pub fn run_in_parallel(step: &StepOptions, options: &HypervisorOptions, phase: &str) -> bool {
    step.run_in_parallel
        .unwrap_or_else(|| options.parallel_phase(phase))
}

/// Errors raised while loading or validating options.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum OptionsError {
    /// Raised when configuration parsing fails.
    #[error("option parsing failed: {0}")]
    Parse(String),
    /// Raised when a configured value is blank.
    #[error("invalid {field}: set HOSTFORGE_{env_suffix} or add {field} to hostforge.toml", env_suffix = field.to_uppercase())]
    InvalidField {
        /// Name of the offending option.
        field: String,
    },
}
