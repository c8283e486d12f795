//! Binary entry point for the hostforge CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use hostforge::{
    BackendRegistry, DryRunSteps, Host, HostNameGenerator, HostSet, HypervisorError,
    HypervisorLifecycle, HypervisorOptions, OptionsError, StepOptions, TracingLogger,
    render_fields,
};

mod cli;

use cli::{Cli, NameCommand, PlanCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] OptionsError),
    #[error("inventory error: {0}")]
    Inventory(String),
    #[error(transparent)]
    Hypervisor(#[from] HypervisorError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let mut stdout = io::stdout();
    let exit_code = match dispatch(cli, &mut stdout).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    match cli {
        Cli::Backends => list_backends(out),
        Cli::Name(command) => generate_names(&command, out),
        Cli::Plan(command) => plan(&command, out).await,
    }
}

fn list_backends(out: &mut impl Write) -> Result<(), CliError> {
    for backend_type in BackendRegistry::with_builtins().registered_types() {
        writeln!(out, "{backend_type}")?;
    }
    Ok(())
}

fn generate_names(command: &NameCommand, out: &mut impl Write) -> Result<(), CliError> {
    let options = HypervisorOptions::load_without_cli_args()?;
    options.validate()?;
    let generator = HostNameGenerator::new(command.prefix.clone().or(options.host_name_prefix));
    for _ in 0..command.count {
        writeln!(out, "{}", generator.generate())?;
    }
    Ok(())
}

/// Runs the lifecycle against dry-run steps. Provisioning is always skipped
/// so no backend touches real infrastructure.
async fn plan(command: &PlanCommand, out: &mut impl Write) -> Result<(), CliError> {
    let mut options = HypervisorOptions::load_without_cli_args()?;
    options.validate()?;
    options.provision = false;

    let hosts = HostSet::new(load_hosts(command)?);
    if hosts.is_empty() {
        return Err(CliError::Inventory(String::from(
            "no hosts given; pass --host or --inventory",
        )));
    }

    let steps = DryRunSteps::new();
    let lifecycle = HypervisorLifecycle::new(
        BackendRegistry::with_builtins(),
        Arc::new(steps.clone()),
        Arc::new(TracingLogger),
    );
    let backend = lifecycle.create(&command.hypervisor, &hosts, options).await?;
    let step_options = if command.parallel {
        StepOptions::parallel(true)
    } else {
        StepOptions::default()
    };
    lifecycle.configure(backend.as_ref(), &step_options).await?;

    for host in hosts.snapshot() {
        writeln!(
            out,
            "{}: connect via {}",
            host.name,
            render_fields(&host.ssh_connection_preference)
        )?;
    }
    let planned = steps.planned();
    if planned.is_empty() {
        writeln!(out, "no configuration steps enabled")?;
    }
    for step in planned {
        writeln!(out, "{step}")?;
    }
    Ok(())
}

fn load_hosts(command: &PlanCommand) -> Result<Vec<Host>, CliError> {
    let Some(path) = command.inventory.as_deref() else {
        return Ok(command
            .hosts
            .iter()
            .map(|name| Host::new(name.as_str()).with_timesync(command.timesync))
            .collect());
    };

    let contents = read_to_string_ambient(path).map_err(CliError::Inventory)?;
    serde_json::from_str(&contents)
        .map_err(|err| CliError::Inventory(format!("{path}: {err}")))
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path)
        .map_err(|err| format!("{path_buf}: {err}"))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
