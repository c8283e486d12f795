//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::backend::{BackendContext, BackendFuture, Hypervisor};
use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::connection::{ConnectionField, DEFAULT_CONNECTION_PREFERENCE};
use crate::error::HypervisorError;
use crate::host::Host;
use crate::logger::Logger;
use crate::options::HypervisorOptions;
use crate::steps::{HostSteps, StepError, StepFuture, StepKind};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// A step invocation observed by [`RecordingSteps`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepCall {
    /// Step that ran.
    pub step: StepKind,
    /// Host names the step received.
    pub hosts: Vec<String>,
}

/// Step implementation that records every call and fails on request.
#[derive(Clone, Debug, Default)]
pub struct RecordingSteps {
    calls: Arc<Mutex<Vec<StepCall>>>,
    timesync_attempts: Arc<AtomicUsize>,
    failing_steps: Arc<Mutex<BTreeSet<&'static str>>>,
    failing_hosts: Arc<Mutex<BTreeSet<String>>>,
}

impl RecordingSteps {
    /// Creates a recorder where every step succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every invocation of `step` fail.
    pub fn fail_step(&self, step: StepKind) {
        lock(&self.failing_steps).insert(step.as_str());
    }

    /// Makes the time sync step fail on `host`.
    pub fn fail_timesync_on(&self, host: impl Into<String>) {
        lock(&self.failing_hosts).insert(host.into());
    }

    /// Returns every recorded call in completion order.
    #[must_use]
    pub fn calls(&self) -> Vec<StepCall> {
        lock(&self.calls).clone()
    }

    /// Returns the recorded step kinds in completion order.
    #[must_use]
    pub fn kinds(&self) -> Vec<StepKind> {
        self.calls().into_iter().map(|call| call.step).collect()
    }

    /// Returns how many time sync steps were started, including failed ones.
    #[must_use]
    pub fn timesync_attempts(&self) -> usize {
        self.timesync_attempts.load(Ordering::SeqCst)
    }

    fn record<'a>(&'a self, step: StepKind, hosts: &'a [Host]) -> StepFuture<'a> {
        Box::pin(async move {
            // Let sibling futures start before this one completes.
            tokio::task::yield_now().await;
            let names: Vec<String> = hosts.iter().map(|host| host.name.clone()).collect();
            lock(&self.calls).push(StepCall {
                step,
                hosts: names.clone(),
            });

            if lock(&self.failing_steps).contains(step.as_str()) {
                return Err(match names.as_slice() {
                    [single] if step == StepKind::Timesync => {
                        StepError::on_host(step, single.clone(), "scripted failure")
                    }
                    _ => StepError::global(step, "scripted failure"),
                });
            }
            if step == StepKind::Timesync {
                let failing = lock(&self.failing_hosts);
                if let Some(name) = names.iter().find(|name| failing.contains(*name)) {
                    return Err(StepError::on_host(step, name.clone(), "scripted failure"));
                }
            }
            Ok(())
        })
    }
}

impl HostSteps for RecordingSteps {
    fn timesync<'a>(&'a self, host: &'a Host, _options: &'a HypervisorOptions) -> StepFuture<'a> {
        self.timesync_attempts.fetch_add(1, Ordering::SeqCst);
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

/// Logger that keeps every notification in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingLogger {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogger {
    /// Creates an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Logger for RecordingLogger {
    fn notify(&self, message: &str) {
        lock(&self.messages).push(message.to_owned());
    }

    fn warn(&self, message: &str) {
        lock(&self.messages).push(format!("warning: {message}"));
    }
}

/// Backend double with a configurable connection preference that counts
/// provision and cleanup calls.
#[derive(Clone, Debug)]
pub struct ScriptedHypervisor {
    context: BackendContext,
    preference: Vec<ConnectionField>,
    state: Arc<ScriptedState>,
}

/// Counters and failure switches shared between clones of a
/// [`ScriptedHypervisor`].
#[derive(Debug, Default)]
pub struct ScriptedState {
    provision_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
    fail_provision: AtomicBool,
}

impl ScriptedState {
    /// Number of `provision` calls observed.
    #[must_use]
    pub fn provision_calls(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }

    /// Number of `cleanup` calls observed.
    #[must_use]
    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }

    /// Makes `provision` fail.
    pub fn fail_provision(&self) {
        self.fail_provision.store(true, Ordering::SeqCst);
    }
}

impl ScriptedHypervisor {
    /// Creates a backend declaring `preference`, sharing `state` with the test.
    #[must_use]
    pub const fn new(
        context: BackendContext,
        preference: Vec<ConnectionField>,
        state: Arc<ScriptedState>,
    ) -> Self {
        Self {
            context,
            preference,
            state,
        }
    }

    /// Creates a backend using the canonical preference.
    #[must_use]
    pub fn canonical(context: BackendContext, state: Arc<ScriptedState>) -> Self {
        Self::new(context, DEFAULT_CONNECTION_PREFERENCE.to_vec(), state)
    }
}

impl Hypervisor for ScriptedHypervisor {
    fn context(&self) -> &BackendContext {
        &self.context
    }

    fn provision(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async move {
            self.state.provision_calls.fetch_add(1, Ordering::SeqCst);
            if self.state.fail_provision.load(Ordering::SeqCst) {
                return Err(HypervisorError::Provider {
                    backend: self.context.backend_type().to_owned(),
                    message: String::from("scripted provision failure"),
                });
            }
            Ok(())
        })
    }

    fn cleanup(&self) -> BackendFuture<'_, (), HypervisorError> {
        Box::pin(async move {
            self.state.cleanup_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn connection_preference(&self) -> Vec<ConnectionField> {
        self.preference.clone()
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
