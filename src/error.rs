//! Errors raised by the lifecycle, the registry, and the backends.

use thiserror::Error;

use crate::command::CommandError;
use crate::connection::{ConnectionField, DEFAULT_CONNECTION_PREFERENCE, render_fields};
use crate::steps::StepError;

/// Errors surfaced while creating, provisioning, or configuring hosts.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HypervisorError {
    /// Raised when no backend is registered for the requested type.
    #[error("invalid hypervisor: {backend_type}")]
    InvalidBackend {
        /// Type identifier passed by the caller.
        backend_type: String,
    },
    /// Raised when a backend's connection preference is not a reordering of
    /// the canonical identity fields.
    #[error(
        "hypervisor connection preference [{}] does not match the API: it must contain exactly [{}] in any order; reorder the fields, do not redefine them",
        render_fields(.declared),
        render_fields(&DEFAULT_CONNECTION_PREFERENCE)
    )]
    ContractViolation {
        /// Preference declared by the backend.
        declared: Vec<ConnectionField>,
    },
    /// A configuration step failed.
    #[error(transparent)]
    Step(#[from] StepError),
    /// A backend failed to provision or clean up.
    #[error("{backend} backend failed: {message}")]
    Provider {
        /// Backend type identifier.
        backend: String,
        /// Human-readable failure description.
        message: String,
    },
    /// An external command run by a backend failed.
    #[error(transparent)]
    Command(#[from] CommandError),
}
