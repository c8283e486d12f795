//! BDD step definitions for the hypervisor lifecycle.

use hostforge::{HypervisorOptions, StepKind, StepOptions};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{
    CustomBackend, LifecycleContext, LifecycleOutcome, Stage, fields_from, hosts_from, split_list,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("unknown option in scenario: {0}")]
    UnknownOption(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn enable(options: &mut HypervisorOptions, name: &str) -> Result<(), StepError> {
    let flag = match name {
        "provision" => &mut options.provision,
        "configure" => &mut options.configure,
        "validate" => &mut options.validate,
        "root_keys" => &mut options.root_keys,
        "add_el_extras" => &mut options.add_el_extras,
        "disable_iptables" => &mut options.disable_iptables,
        "set_env" => &mut options.set_env,
        "disable_updates" => &mut options.disable_updates,
        other => return Err(StepError::UnknownOption(other.to_owned())),
    };
    *flag = true;
    Ok(())
}

#[given("hosts \"{names}\"")]
fn given_hosts(mut lifecycle_context: LifecycleContext, names: String) -> LifecycleContext {
    lifecycle_context.hosts = hosts_from(&names);
    lifecycle_context
}

#[given("time sync is enabled on every host")]
fn timesync_everywhere(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.hosts.update(|host| host.timesync = true);
    lifecycle_context
}

#[given("a custom backend \"{type_name}\" preferring \"{fields}\"")]
fn custom_backend(
    mut lifecycle_context: LifecycleContext,
    type_name: String,
    fields: String,
) -> LifecycleContext {
    lifecycle_context.custom.push(CustomBackend {
        type_name,
        preference: fields_from(&fields),
    });
    lifecycle_context
}

#[given("the options \"{names}\" are enabled")]
fn options_enabled(
    mut lifecycle_context: LifecycleContext,
    names: String,
) -> Result<LifecycleContext, StepError> {
    for name in split_list(&names) {
        enable(&mut lifecycle_context.options, name)?;
    }
    Ok(lifecycle_context)
}

#[given("time sync fails on \"{host}\"")]
fn timesync_fails(lifecycle_context: LifecycleContext, host: String) -> LifecycleContext {
    lifecycle_context.steps.fail_timesync_on(host);
    lifecycle_context
}

#[given("configuration runs in parallel")]
fn configure_in_parallel(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.step_options = StepOptions::parallel(true);
    lifecycle_context
}

#[when("I create a \"{backend_type}\" hypervisor")]
fn create_hypervisor(
    mut lifecycle_context: LifecycleContext,
    backend_type: String,
) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let lifecycle = lifecycle_context.lifecycle();
    let result = runtime.block_on(lifecycle.create(
        &backend_type,
        &lifecycle_context.hosts,
        lifecycle_context.options.clone(),
    ));

    lifecycle_context.outcome = Some(match result {
        Ok(_) => LifecycleOutcome::Succeeded(Stage::Create),
        Err(err) => LifecycleOutcome::Failed {
            stage: Stage::Create,
            message: err.to_string(),
        },
    });
    Ok(lifecycle_context)
}

#[when("I create and configure a \"{backend_type}\" hypervisor")]
fn create_and_configure(
    mut lifecycle_context: LifecycleContext,
    backend_type: String,
) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let lifecycle = lifecycle_context.lifecycle();
    let hosts = lifecycle_context.hosts.clone();
    let options = lifecycle_context.options.clone();
    let step_options = lifecycle_context.step_options;

    let outcome = runtime.block_on(async move {
        let backend = match lifecycle.create(&backend_type, &hosts, options).await {
            Ok(backend) => backend,
            Err(err) => {
                return LifecycleOutcome::Failed {
                    stage: Stage::Create,
                    message: err.to_string(),
                };
            }
        };
        match lifecycle.configure(backend.as_ref(), &step_options).await {
            Ok(()) => LifecycleOutcome::Succeeded(Stage::Configure),
            Err(err) => LifecycleOutcome::Failed {
                stage: Stage::Configure,
                message: err.to_string(),
            },
        }
    });

    lifecycle_context.outcome = Some(outcome);
    Ok(lifecycle_context)
}

#[then("creation succeeds")]
fn creation_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(LifecycleOutcome::Succeeded(Stage::Create)) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected successful creation, got {other:?}"
        ))),
    }
}

fn failure_mentions(
    lifecycle_context: &LifecycleContext,
    expected_stage: &Stage,
    fragment: &str,
) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(LifecycleOutcome::Failed { stage, message })
            if stage == expected_stage && message.contains(fragment) =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected {expected_stage:?} failure mentioning {fragment:?}, got {other:?}"
        ))),
    }
}

#[then("creation fails with \"{fragment}\"")]
fn creation_fails(lifecycle_context: &LifecycleContext, fragment: String) -> Result<(), StepError> {
    failure_mentions(lifecycle_context, &Stage::Create, &fragment)
}

#[then("configuration fails with \"{fragment}\"")]
fn configuration_fails(
    lifecycle_context: &LifecycleContext,
    fragment: String,
) -> Result<(), StepError> {
    failure_mentions(lifecycle_context, &Stage::Configure, &fragment)
}

#[then("every host prefers \"{fields}\"")]
fn every_host_prefers(lifecycle_context: &LifecycleContext, fields: String) -> Result<(), StepError> {
    let expected = fields_from(&fields);
    let hosts = lifecycle_context.hosts.snapshot();
    if !hosts.is_empty()
        && hosts
            .iter()
            .all(|host| host.ssh_connection_preference == expected)
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected every host to prefer {expected:?}, got {hosts:?}"
        )))
    }
}

#[then("no host has a connection preference")]
fn no_preference(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let hosts = lifecycle_context.hosts.snapshot();
    if hosts
        .iter()
        .all(|host| host.ssh_connection_preference.is_empty())
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "hosts were mutated: {hosts:?}"
        )))
    }
}

#[then("the steps run are \"{steps}\"")]
fn steps_run(lifecycle_context: &LifecycleContext, steps: String) -> Result<(), StepError> {
    let actual: Vec<&str> = lifecycle_context
        .steps
        .kinds()
        .into_iter()
        .map(StepKind::as_str)
        .collect();
    let expected: Vec<&str> = split_list(&steps).collect();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected steps {expected:?}, got {actual:?}"
        )))
    }
}

#[then("time sync was attempted {count:u32} times")]
fn timesync_attempts(lifecycle_context: &LifecycleContext, count: u32) -> Result<(), StepError> {
    let attempts = lifecycle_context.steps.timesync_attempts();
    if attempts == count as usize {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} time sync attempts, got {attempts}"
        )))
    }
}

#[then("the step \"{step}\" did not run")]
fn step_did_not_run(lifecycle_context: &LifecycleContext, step: String) -> Result<(), StepError> {
    let ran = lifecycle_context
        .steps
        .kinds()
        .into_iter()
        .any(|kind| kind.as_str() == step);
    if ran {
        Err(StepError::Assertion(format!("step {step} ran")))
    } else {
        Ok(())
    }
}
