//! Container backend driving the `docker` CLI.
//!
//! Each host becomes one detached container named with a generated host
//! name. Containers carry a run label so a crashed run can be swept by hand
//! with `docker ps --filter label=hostforge.run=<id>`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{BackendContext, BackendFuture, Hypervisor};
use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::connection::ConnectionField;
use crate::error::HypervisorError;
use crate::host::Host;

/// Label key applied to every container started by a run.
pub const RUN_LABEL: &str = "hostforge.run";

/// Backend that provisions one container per host.
#[derive(Debug)]
pub struct DockerHypervisor {
    context: BackendContext,
    runner: Arc<dyn CommandRunner>,
    run_id: String,
    containers: Mutex<Vec<String>>,
}

impl DockerHypervisor {
    /// Creates a backend that runs container commands through `runner`.
    #[must_use]
    pub fn new(context: BackendContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            context,
            runner,
            run_id: Uuid::new_v4().to_string(),
            containers: Mutex::new(Vec::new()),
        }
    }

    /// Identifier stored in the [`RUN_LABEL`] label of this run's containers.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Container ids started so far and not yet removed.
    #[must_use]
    pub fn containers(&self) -> Vec<String> {
        self.containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn bin(&self) -> &str {
        &self.context.options().docker_bin
    }

    fn run_docker(&self, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        let output = self.runner.run(self.bin(), args)?;
        output.into_success(self.bin())
    }

    fn start_container(&self, host: &Host, container_name: &str) -> Result<String, CommandError> {
        let image = host
            .image
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .unwrap_or(&self.context.options().docker_image);
        let args = vec![
            OsString::from("run"),
            OsString::from("-d"),
            OsString::from("--name"),
            OsString::from(container_name),
            OsString::from("--hostname"),
            OsString::from(&host.name),
            OsString::from("--label"),
            OsString::from(format!("{RUN_LABEL}={}", self.run_id)),
            OsString::from(image),
        ];
        let output = self.run_docker(&args)?;
        let id = output.stdout.trim();
        if id.is_empty() {
            return Err(CommandError::Parse {
                program: self.bin().to_owned(),
                message: format!("no container id returned for {}", host.name),
            });
        }
        Ok(id.to_owned())
    }

    fn container_ip(&self, id: &str) -> Result<String, CommandError> {
        let args = vec![OsString::from("inspect"), OsString::from(id)];
        let output = self.run_docker(&args)?;
        parse_container_ip(&output.stdout).map_err(|message| CommandError::Parse {
            program: self.bin().to_owned(),
            message,
        })
    }

    fn remove_container(&self, id: &str) -> Result<(), CommandError> {
        let args = vec![OsString::from("rm"), OsString::from("-f"), OsString::from(id)];
        self.run_docker(&args).map(|_| ())
    }
}

impl Hypervisor for DockerHypervisor {
    fn context(&self) -> &BackendContext {
        &self.context
    }

    fn provision(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async move {
            for (index, host) in self.context.hosts().snapshot().iter().enumerate() {
                let container_name = self.context.generate_host_name();
                let id = self.start_container(host, &container_name)?;
                self.containers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(id.clone());
                let ip = self.container_ip(&id)?;
                info!(host = %host.name, container = %container_name, %ip, "container started");

                self.context.hosts().update_at(index, |entry| {
                    entry.ip = Some(ip);
                    entry.vmhostname = Some(container_name);
                });
            }
            Ok(())
        })
    }

    fn cleanup(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async move {
            let containers = std::mem::take(
                &mut *self
                    .containers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            let mut first_failure = None;
            let mut retained = Vec::new();
            for id in containers {
                match self.remove_container(&id) {
                    Ok(()) => debug!(container = %id, "container removed"),
                    Err(err) => {
                        warn!(container = %id, error = %err, "container removal failed");
                        self.context
                            .logger()
                            .warn(&format!("failed to remove container {id}: {err}"));
                        first_failure.get_or_insert(err);
                        retained.push(id);
                    }
                }
            }
            if !retained.is_empty() {
                // Failed removals stay tracked so the next cleanup retries them.
                self.containers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .splice(0..0, retained);
            }
            match first_failure {
                Some(err) => Err(HypervisorError::from(err)),
                None => Ok(()),
            }
        })
    }

    fn connection_preference(&self) -> Vec<ConnectionField> {
        vec![
            ConnectionField::Ip,
            ConnectionField::Hostname,
            ConnectionField::Vmhostname,
        ]
    }
}

#[derive(Debug, Deserialize)]
struct ContainerInspect {
    #[serde(rename = "NetworkSettings", default)]
    network_settings: NetworkSettings,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
    #[serde(rename = "Networks", default)]
    networks: BTreeMap<String, NetworkEndpoint>,
}

#[derive(Debug, Deserialize)]
struct NetworkEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Extracts the container address from `docker inspect` output, preferring
/// the default bridge address over per-network ones.
fn parse_container_ip(stdout: &str) -> Result<String, String> {
    let inspected: Vec<ContainerInspect> =
        serde_json::from_str(stdout).map_err(|err| err.to_string())?;
    let settings = inspected
        .into_iter()
        .next()
        .map(|container| container.network_settings)
        .ok_or_else(|| String::from("inspect returned no containers"))?;

    std::iter::once(settings.ip_address)
        .chain(settings.networks.into_values().map(|net| net.ip_address))
        .find(|ip| !ip.trim().is_empty())
        .ok_or_else(|| String::from("container has no IP address"))
}

#[cfg(test)]
mod tests;
