//! Unit tests for the container backend.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::*;
use crate::host::HostSet;
use crate::options::HypervisorOptions;
use crate::test_support::{RecordingLogger, RecordingSteps, ScriptedRunner};

const INSPECT_BRIDGE: &str = r#"[{"Id":"c1","NetworkSettings":{"IPAddress":"172.17.0.2","Networks":{}}}]"#;
const INSPECT_NETWORK: &str = r#"[{"Id":"c2","NetworkSettings":{"IPAddress":"","Networks":{"lab":{"IPAddress":"10.9.0.7"}}}}]"#;

struct Harness {
    backend: DockerHypervisor,
    runner: ScriptedRunner,
    logger: RecordingLogger,
    hosts: HostSet,
}

#[fixture]
fn harness() -> Harness {
    let hosts = HostSet::new(vec![
        Host::new("web"),
        Host::new("db").with_image("rockylinux:9"),
    ]);
    let options = HypervisorOptions {
        host_name_prefix: Some(String::from("ci-")),
        ..HypervisorOptions::default()
    };
    let runner = ScriptedRunner::new();
    let logger = RecordingLogger::new();
    let context = BackendContext::new(
        "docker",
        hosts.clone(),
        options,
        Arc::new(RecordingSteps::new()),
        Arc::new(logger.clone()),
    );
    Harness {
        backend: DockerHypervisor::new(context, Arc::new(runner.clone())),
        runner,
        logger,
        hosts,
    }
}

fn arg(args: &[OsString], index: usize) -> String {
    args.get(index)
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[rstest]
#[tokio::test]
async fn provision_starts_one_container_per_host(harness: Harness) {
    harness.runner.push_stdout("c1\n");
    harness.runner.push_stdout(INSPECT_BRIDGE);
    harness.runner.push_stdout("c2\n");
    harness.runner.push_stdout(INSPECT_NETWORK);

    harness
        .backend
        .provision()
        .await
        .expect("provision should succeed");

    let invocations = harness.runner.invocations();
    assert_eq!(invocations.len(), 4);
    let run_args: Vec<Vec<OsString>> = invocations
        .iter()
        .filter(|call| arg(&call.args, 0) == "run")
        .map(|call| call.args.clone())
        .collect();
    let [web_run, db_run] = run_args.as_slice() else {
        panic!("expected two run invocations, got {run_args:?}");
    };
    assert_eq!(arg(web_run, 5), "web");
    assert_eq!(arg(web_run, 7), format!("{RUN_LABEL}={}", harness.backend.run_id()));
    assert_eq!(arg(web_run, 8), "ubuntu:24.04");
    assert_eq!(arg(db_run, 8), "rockylinux:9");
    assert!(arg(web_run, 3).starts_with("ci-"));

    let hosts = harness.hosts.snapshot();
    let ips: Vec<Option<&str>> = hosts.iter().map(|host| host.ip.as_deref()).collect();
    assert_eq!(ips, vec![Some("172.17.0.2"), Some("10.9.0.7")]);
    assert!(hosts.iter().all(|host| {
        host.vmhostname
            .as_deref()
            .is_some_and(|name| name.starts_with("ci-") && name.len() == 18)
    }));
    assert_eq!(harness.backend.containers(), vec!["c1", "c2"]);
}

#[rstest]
#[tokio::test]
async fn provision_surfaces_run_failure(harness: Harness) {
    harness.runner.push_failure(125);

    let err = harness
        .backend
        .provision()
        .await
        .expect_err("failed run should abort provisioning");

    assert!(matches!(
        err,
        HypervisorError::Command(CommandError::Failure {
            status: Some(125),
            ..
        })
    ));
    assert!(harness.backend.containers().is_empty());
    assert!(harness.hosts.snapshot().iter().all(|host| host.ip.is_none()));
}

#[rstest]
#[tokio::test]
async fn provision_rejects_container_without_address(harness: Harness) {
    harness.runner.push_stdout("c1");
    harness
        .runner
        .push_stdout(r#"[{"NetworkSettings":{"IPAddress":"","Networks":{}}}]"#);

    let err = harness
        .backend
        .provision()
        .await
        .expect_err("missing address should fail");

    assert_eq!(
        err,
        HypervisorError::Command(CommandError::Parse {
            program: String::from("docker"),
            message: String::from("container has no IP address"),
        })
    );
    assert_eq!(harness.backend.containers(), vec!["c1"]);
}

#[rstest]
#[tokio::test]
async fn cleanup_removes_every_container_and_reports_first_failure(harness: Harness) {
    harness.runner.push_stdout("c1");
    harness.runner.push_stdout(INSPECT_BRIDGE);
    harness.runner.push_stdout("c2");
    harness.runner.push_stdout(INSPECT_NETWORK);
    harness
        .backend
        .provision()
        .await
        .expect("provision should succeed");

    harness.runner.push_failure(1);
    harness.runner.push_success();
    let err = harness
        .backend
        .cleanup()
        .await
        .expect_err("first removal fails");

    assert!(matches!(err, HypervisorError::Command(CommandError::Failure { .. })));
    let removals: Vec<String> = harness
        .runner
        .invocations()
        .iter()
        .filter(|call| arg(&call.args, 0) == "rm")
        .map(|call| call.command_string())
        .collect();
    assert_eq!(removals, vec!["docker rm -f c1", "docker rm -f c2"]);
    assert_eq!(harness.backend.containers(), vec!["c1"]);
    assert_eq!(harness.logger.messages().len(), 1);
}

#[rstest]
#[tokio::test]
async fn cleanup_retries_containers_that_failed_to_be_removed(harness: Harness) {
    harness.runner.push_stdout("c1");
    harness.runner.push_stdout(INSPECT_BRIDGE);
    harness.runner.push_stdout("c2");
    harness.runner.push_stdout(INSPECT_NETWORK);
    harness
        .backend
        .provision()
        .await
        .expect("provision should succeed");

    harness.runner.push_failure(1);
    harness.runner.push_success();
    harness
        .backend
        .cleanup()
        .await
        .expect_err("first removal fails");

    harness.runner.push_success();
    harness
        .backend
        .cleanup()
        .await
        .expect("retried removal should succeed");

    let removals: Vec<String> = harness
        .runner
        .invocations()
        .iter()
        .filter(|call| arg(&call.args, 0) == "rm")
        .map(|call| call.command_string())
        .collect();
    assert_eq!(removals, vec!["docker rm -f c1", "docker rm -f c2", "docker rm -f c1"]);
    assert!(harness.backend.containers().is_empty());
}

#[rstest]
#[tokio::test]
async fn cleanup_without_containers_runs_nothing(harness: Harness) {
    harness.backend.cleanup().await.expect("nothing to remove");
    assert!(harness.runner.invocations().is_empty());
}

#[rstest]
fn docker_prefers_ip_then_hostname(harness: Harness) {
    assert_eq!(
        harness.backend.connection_preference(),
        vec![
            ConnectionField::Ip,
            ConnectionField::Hostname,
            ConnectionField::Vmhostname
        ]
    );
}

#[rstest]
#[case(INSPECT_BRIDGE, Ok("172.17.0.2"))]
#[case(INSPECT_NETWORK, Ok("10.9.0.7"))]
#[case("[]", Err("inspect returned no containers"))]
#[case("[{}]", Err("container has no IP address"))]
fn parse_container_ip_cases(#[case] stdout: &str, #[case] expected: Result<&str, &str>) {
    let parsed = parse_container_ip(stdout);
    assert_eq!(parsed.as_deref().map_err(String::as_str), expected);
}

#[test]
fn parse_container_ip_rejects_invalid_json() {
    assert!(parse_container_ip("not json").is_err());
}
