//! SSH connection preference contract shared by every backend.
//!
//! A backend may reorder the identity fields a host is reached through, but it
//! may not add, drop or repeat any of them. [`set_ssh_connection_preference`]
//! enforces that contract and installs the accepted order on every host.

use std::fmt;

use serde::Deserialize;
use tracing::debug;

use crate::error::HypervisorError;
use crate::host::HostSet;

/// Network identity field used when connecting to a host.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionField {
    /// The host's IP address.
    Ip,
    /// The hostname assigned by the hypervisor.
    Vmhostname,
    /// The host's own hostname.
    Hostname,
}

impl ConnectionField {
    /// Returns the lowercase field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Vmhostname => "vmhostname",
            Self::Hostname => "hostname",
        }
    }
}

impl fmt::Display for ConnectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preference order used by backends that do not override it.
pub const DEFAULT_CONNECTION_PREFERENCE: [ConnectionField; 3] = [
    ConnectionField::Ip,
    ConnectionField::Vmhostname,
    ConnectionField::Hostname,
];

/// Returns `true` when `preference` is a reordering of
/// [`DEFAULT_CONNECTION_PREFERENCE`].
///
/// Both lists are compared as multisets, so a repeated field is rejected just
/// like a missing one.
#[must_use]
pub fn is_valid_preference(preference: &[ConnectionField]) -> bool {
    let mut declared = preference.to_vec();
    declared.sort_unstable();
    let mut canonical = DEFAULT_CONNECTION_PREFERENCE.to_vec();
    canonical.sort_unstable();
    declared == canonical
}

/// Validates `preference` and assigns it to every host in `hosts`.
///
/// Hosts are left untouched when validation fails.
///
/// # Errors
///
/// Returns [`HypervisorError::ContractViolation`] when the declared
/// preference is not a permutation of the canonical field set.
pub fn set_ssh_connection_preference(
    hosts: &HostSet,
    preference: &[ConnectionField],
) -> Result<(), HypervisorError> {
    if !is_valid_preference(preference) {
        return Err(HypervisorError::ContractViolation {
            declared: preference.to_vec(),
        });
    }

    hosts.update(|host| host.ssh_connection_preference = preference.to_vec());
    debug!(
        preference = %render_fields(preference),
        hosts = hosts.len(),
        "installed ssh connection preference"
    );
    Ok(())
}

/// Renders fields as a comma separated list, e.g. `ip, vmhostname, hostname`.
#[must_use]
pub fn render_fields(fields: &[ConnectionField]) -> String {
    fields
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
