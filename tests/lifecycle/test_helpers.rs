//! Shared fixtures for lifecycle BDD scenarios.

use std::sync::Arc;

use hostforge::test_support::{
    RecordingLogger, RecordingSteps, ScriptedHypervisor, ScriptedRunner, ScriptedState,
};
use hostforge::{
    BackendRegistry, ConnectionField, Host, HostSet, HypervisorLifecycle, HypervisorOptions,
    StepOptions,
};
use rstest::fixture;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    Create,
    Configure,
}

#[derive(Clone, Debug)]
pub enum LifecycleOutcome {
    Succeeded(Stage),
    Failed { stage: Stage, message: String },
}

#[derive(Clone, Debug)]
pub struct CustomBackend {
    pub type_name: String,
    pub preference: Vec<ConnectionField>,
}

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub hosts: HostSet,
    pub options: HypervisorOptions,
    pub step_options: StepOptions,
    pub steps: RecordingSteps,
    pub logger: RecordingLogger,
    pub custom: Vec<CustomBackend>,
    pub outcome: Option<LifecycleOutcome>,
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext {
        hosts: HostSet::default(),
        options: HypervisorOptions::default(),
        step_options: StepOptions::default(),
        steps: RecordingSteps::new(),
        logger: RecordingLogger::new(),
        custom: Vec::new(),
        outcome: None,
    }
}

impl LifecycleContext {
    pub fn lifecycle(&self) -> HypervisorLifecycle {
        let mut registry = BackendRegistry::with_builtins_using(Arc::new(ScriptedRunner::new()));
        for backend in &self.custom {
            let preference = backend.preference.clone();
            registry.register(backend.type_name.clone(), move |context| {
                Ok(Box::new(ScriptedHypervisor::new(
                    context,
                    preference.clone(),
                    Arc::new(ScriptedState::default()),
                )))
            });
        }
        HypervisorLifecycle::new(
            registry,
            Arc::new(self.steps.clone()),
            Arc::new(self.logger.clone()),
        )
    }
}

pub fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

pub fn hosts_from(list: &str) -> HostSet {
    HostSet::new(split_list(list).map(Host::new).collect())
}

pub fn fields_from(list: &str) -> Vec<ConnectionField> {
    split_list(list)
        .map(|name| match name {
            "ip" => ConnectionField::Ip,
            "vmhostname" => ConnectionField::Vmhostname,
            "hostname" => ConnectionField::Hostname,
            other => panic!("unknown connection field in scenario: {other}"),
        })
        .collect()
}
