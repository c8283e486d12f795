//! Command-line interface definitions for the `hostforge` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `hostforge` binary.
#[derive(Debug, Parser)]
#[command(
    name = "hostforge",
    about = "Create, configure, and tear down test hosts through pluggable hypervisor backends",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List the hypervisor types that can be created.
    #[command(name = "backends", about = "List the hypervisor types that can be created")]
    Backends,
    /// Generate random host names.
    #[command(name = "name", about = "Generate random host names")]
    Name(NameCommand),
    /// Show the configuration steps a run would execute.
    #[command(
        name = "plan",
        about = "Show the configuration steps a run would execute without touching any host"
    )]
    Plan(PlanCommand),
}

/// Arguments for the `hostforge name` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct NameCommand {
    /// Prefix prepended to each generated name.
    ///
    /// Falls back to `host_name_prefix` from configuration when omitted.
    #[arg(long, value_name = "PREFIX")]
    pub(crate) prefix: Option<String>,
    /// Number of names to generate.
    #[arg(long, short = 'n', value_name = "COUNT", default_value_t = 1)]
    pub(crate) count: usize,
}

/// Arguments for the `hostforge plan` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct PlanCommand {
    /// Hypervisor type to plan for, e.g. `docker`, `noop`, or `none`.
    #[arg(long, value_name = "TYPE", default_value = "default")]
    pub(crate) hypervisor: String,
    /// JSON inventory file holding an array of host objects.
    #[arg(long, value_name = "PATH", conflicts_with = "hosts")]
    pub(crate) inventory: Option<String>,
    /// Host name to include; repeat for several hosts.
    #[arg(long = "host", value_name = "NAME")]
    pub(crate) hosts: Vec<String>,
    /// Enable time synchronisation on hosts given with `--host`.
    #[arg(long)]
    pub(crate) timesync: bool,
    /// Run time synchronisation across hosts in parallel.
    #[arg(long)]
    pub(crate) parallel: bool,
}
