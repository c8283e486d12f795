//! Hosts under test and the shared collection handed to backends.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;

use crate::connection::ConnectionField;

/// A single system under test.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Host {
    /// Inventory name of the host.
    pub name: String,
    /// IP address, usually filled in by the backend during provisioning.
    #[serde(default)]
    pub ip: Option<String>,
    /// Hostname assigned by the hypervisor.
    #[serde(default)]
    pub vmhostname: Option<String>,
    /// The host's own hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Platform string such as `el-9-x86_64`.
    #[serde(default)]
    pub platform: String,
    /// Image to boot, for backends that need one.
    #[serde(default)]
    pub image: Option<String>,
    /// Whether the time synchronisation step should run on this host.
    #[serde(default)]
    pub timesync: bool,
    /// Identity fields to try, in order, when connecting over SSH.
    #[serde(skip)]
    pub ssh_connection_preference: Vec<ConnectionField>,
}

impl Host {
    /// Creates a host with the given inventory name and no identity fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Enables or disables the time synchronisation step.
    #[must_use]
    pub const fn with_timesync(mut self, timesync: bool) -> Self {
        self.timesync = timesync;
        self
    }

    /// Sets the IP address.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Sets the hypervisor-assigned hostname.
    #[must_use]
    pub fn with_vmhostname(mut self, vmhostname: impl Into<String>) -> Self {
        self.vmhostname = Some(vmhostname.into());
        self
    }

    /// Sets the host's own hostname.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sets the image to boot.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Returns the value stored for `field`, ignoring blank values.
    #[must_use]
    pub fn identity(&self, field: ConnectionField) -> Option<&str> {
        let value = match field {
            ConnectionField::Ip => self.ip.as_deref(),
            ConnectionField::Vmhostname => self.vmhostname.as_deref(),
            ConnectionField::Hostname => self.hostname.as_deref(),
        };
        value.filter(|candidate| !candidate.trim().is_empty())
    }

    /// Returns the address SSH should use: the first identity field, in
    /// preference order, that carries a value.
    #[must_use]
    pub fn connection_target(&self) -> Option<&str> {
        self.ssh_connection_preference
            .iter()
            .find_map(|field| self.identity(*field))
    }
}

/// Shared, cloneable handle over the hosts of one run.
///
/// The caller and the backend hold clones of the same handle, so identity
/// fields filled in during provisioning are visible to both.
#[derive(Clone, Debug, Default)]
pub struct HostSet {
    hosts: Arc<RwLock<Vec<Host>>>,
}

impl HostSet {
    /// Wraps `hosts` in a shared handle.
    #[must_use]
    pub fn new(hosts: Vec<Host>) -> Self {
        Self {
            hosts: Arc::new(RwLock::new(hosts)),
        }
    }

    /// Returns an owned copy of every host.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Host> {
        self.read().clone()
    }

    /// Returns the number of hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` when the set holds no hosts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the inventory names in collection order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|host| host.name.clone()).collect()
    }

    /// Applies `apply` to every host.
    pub fn update<F>(&self, mut apply: F)
    where
        F: FnMut(&mut Host),
    {
        for host in self.write().iter_mut() {
            apply(host);
        }
    }

    /// Applies `apply` to the host at `index`; returns `false` when the index
    /// is out of range.
    pub fn update_at<F>(&self, index: usize, apply: F) -> bool
    where
        F: FnOnce(&mut Host),
    {
        self.write().get_mut(index).map(apply).is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Host>> {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Host>> {
        self.hosts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Vec<Host>> for HostSet {
    fn from(hosts: Vec<Host>) -> Self {
        Self::new(hosts)
    }
}
