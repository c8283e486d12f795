//! Core library for the hostforge hypervisor layer.
//!
//! Test harnesses ask a [`HypervisorLifecycle`] to create a backend by type
//! name over a shared [`HostSet`]. The lifecycle resolves the backend through
//! the [`BackendRegistry`], installs the backend's SSH connection preference
//! on every host, optionally provisions, and later drives the
//! [`ConfigurationPipeline`] (package proxy, configuration steps, host
//! validation) and cleanup.

pub mod backend;
pub mod builtin;
pub mod command;
pub mod connection;
pub mod error;
pub mod host;
pub mod host_name;
pub mod lifecycle;
pub mod logger;
pub mod options;
pub mod pipeline;
pub mod registry;
pub mod steps;
pub mod test_support;

pub use backend::{BackendContext, BackendFuture, Hypervisor};
pub use builtin::{DefaultHypervisor, DockerHypervisor, NoopHypervisor};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use connection::{
    ConnectionField, DEFAULT_CONNECTION_PREFERENCE, is_valid_preference, render_fields,
    set_ssh_connection_preference,
};
pub use error::HypervisorError;
pub use host::{Host, HostSet};
pub use host_name::{CHARMAP, HOST_NAME_LENGTH, HostNameGenerator};
pub use lifecycle::HypervisorLifecycle;
pub use logger::{Logger, TracingLogger};
pub use options::{HypervisorOptions, OptionsError, StepOptions, run_in_parallel};
pub use pipeline::ConfigurationPipeline;
pub use registry::{BUILTIN_TYPES, BackendFactory, BackendRegistry, camel_case};
pub use steps::{DryRunSteps, HostSteps, PlannedStep, StepError, StepFuture, StepKind};
