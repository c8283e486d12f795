//! Backend registry mapping type identifiers to constructors.
//!
//! Built-in backends are matched by exact, case-sensitive name. Every other
//! identifier is converted from `snake_case` to `CamelCase` and looked up
//! among the custom backends registered by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::backend::{BackendContext, Hypervisor};
use crate::builtin::{DefaultHypervisor, DockerHypervisor, NoopHypervisor};
use crate::command::{CommandRunner, ProcessCommandRunner};
use crate::error::HypervisorError;

/// Constructor producing a backend from its context.
pub type BackendFactory =
    Arc<dyn Fn(BackendContext) -> Result<Box<dyn Hypervisor>, HypervisorError> + Send + Sync>;

/// Identifiers of the backends shipped with the crate.
pub const BUILTIN_TYPES: [&str; 4] = ["default", "docker", "none", "noop"];

/// Table of backend constructors.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    builtins: BTreeMap<&'static str, BackendFactory>,
    custom: BTreeMap<String, BackendFactory>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("builtins", &self.builtins.keys().collect::<Vec<_>>())
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BackendRegistry {
    /// Creates a registry with no backends at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in backends, with the container
    /// backend running real processes.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::with_builtins_using(Arc::new(ProcessCommandRunner))
    }

    /// Creates a registry holding the built-in backends, with the container
    /// backend running commands through `runner`.
    #[must_use]
    pub fn with_builtins_using(runner: Arc<dyn CommandRunner>) -> Self {
        let identity: BackendFactory = Arc::new(identity_backend);
        let noop: BackendFactory = Arc::new(noop_backend);
        let docker: BackendFactory = Arc::new(
            move |context: BackendContext| -> Result<Box<dyn Hypervisor>, HypervisorError> {
                Ok(Box::new(DockerHypervisor::new(context, Arc::clone(&runner))))
            },
        );

        let mut builtins = BTreeMap::new();
        builtins.insert("default", Arc::clone(&identity));
        builtins.insert("none", identity);
        builtins.insert("noop", noop);
        builtins.insert("docker", docker);
        Self {
            builtins,
            custom: BTreeMap::new(),
        }
    }

    /// Registers a custom backend under its `CamelCase` type name, replacing
    /// any backend previously registered under that name.
    ///
    /// A backend registered as `VagrantLibvirt` is created for the
    /// identifier `vagrant_libvirt`. Names are stored in the form lookups
    /// produce, so `vagrant` is kept as `Vagrant` and `AWSEc2` answers to
    /// `a_w_s_ec2`.
    pub fn register<F>(&mut self, type_name: impl AsRef<str>, factory: F) -> &mut Self
    where
        F: Fn(BackendContext) -> Result<Box<dyn Hypervisor>, HypervisorError>
            + Send
            + Sync
            + 'static,
    {
        let key = camel_case(&snake_case(type_name.as_ref()));
        self.custom.insert(key, Arc::new(factory));
        self
    }

    /// Finds the constructor for `backend_type`.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::InvalidBackend`] naming `backend_type` when
    /// it is empty or nothing is registered for it.
    pub fn resolve(&self, backend_type: &str) -> Result<&BackendFactory, HypervisorError> {
        if backend_type.is_empty() {
            return Err(invalid(backend_type));
        }
        if let Some(factory) = self.builtins.get(backend_type) {
            return Ok(factory);
        }
        self.custom
            .get(&camel_case(backend_type))
            .ok_or_else(|| invalid(backend_type))
    }

    /// Builds the backend named by `context.backend_type()`.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::InvalidBackend`] when the type cannot be
    /// resolved, or whatever error the constructor itself reports.
    pub fn instantiate(
        &self,
        context: BackendContext,
    ) -> Result<Box<dyn Hypervisor>, HypervisorError> {
        let factory = self.resolve(context.backend_type())?;
        factory(context)
    }

    /// Lists every identifier that resolves: built-in names followed by the
    /// `snake_case` form of each custom backend. Custom backends shadowed by
    /// a built-in of the same name are left out.
    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        let custom = self
            .custom
            .keys()
            .map(|name| snake_case(name))
            .filter(|name| !name.is_empty() && !self.builtins.contains_key(name.as_str()));
        self.builtins
            .keys()
            .map(|name| (*name).to_owned())
            .chain(custom)
            .collect()
    }
}

fn identity_backend(context: BackendContext) -> Result<Box<dyn Hypervisor>, HypervisorError> {
    Ok(Box::new(DefaultHypervisor::new(context)))
}

fn noop_backend(context: BackendContext) -> Result<Box<dyn Hypervisor>, HypervisorError> {
    Ok(Box::new(NoopHypervisor::new(context)))
}

fn invalid(backend_type: &str) -> HypervisorError {
    HypervisorError::InvalidBackend {
        backend_type: backend_type.to_owned(),
    }
}

/// Converts `vagrant_libvirt` into `VagrantLibvirt`. Each underscore-separated
/// segment keeps a leading capital and lowercases the rest.
#[must_use]
pub fn camel_case(backend_type: &str) -> String {
    backend_type
        .split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            chars.next().map_or_else(String::new, |first| {
                first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect()
            })
        })
        .collect()
}

fn snake_case(type_name: &str) -> String {
    let mut rendered = String::with_capacity(type_name.len() + 4);
    for (index, ch) in type_name.chars().enumerate() {
        if ch.is_uppercase() && index > 0 {
            rendered.push('_');
        }
        rendered.extend(ch.to_lowercase());
    }
    rendered
}
