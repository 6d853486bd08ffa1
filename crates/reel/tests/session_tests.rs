//! Integration tests for the session frontends.
//!
//! Shell, ssh, and cluster-exec sessions describe a command line and hand
//! it to an injected spawner; these tests capture that command line with
//! the mock spawner and assert the exact contract.
//!
//! These tests require the `mock` feature to be enabled.

#![cfg(feature = "mock")]

use std::time::Duration;

use reel::mock::{MockSpawner, MockTransport};
use reel::{ClusterExec, ExecTarget, ReelError, Shell, SpawnOptions, Ssh};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Test ssh argv: the identity comes first, extra arguments follow.
#[test]
fn ssh_builds_the_expected_argv() {
    let spawner = MockSpawner::new();
    spawner.queue_session(MockTransport::new());

    let extra = vec!["-p".to_string(), "2222".to_string()];
    let session = Ssh::spawn(
        &spawner,
        "admin",
        "server.example.com",
        &extra,
        Duration::from_secs(30),
        &SpawnOptions::new(),
    )
    .unwrap();

    assert_eq!(session.user(), "admin");
    assert_eq!(session.host(), "server.example.com");

    let call = spawner.last_call().unwrap();
    assert_eq!(call.command, "ssh");
    assert_eq!(call.args, ["admin@server.example.com", "-p", "2222"]);
    assert_eq!(call.timeout, Duration::from_secs(30));
}

/// Test cluster exec argv, flag for flag.
#[test]
fn cluster_exec_builds_the_expected_argv() {
    let spawner = MockSpawner::new();
    spawner.queue_session(MockTransport::new());

    let target = ExecTarget::new("etcd-0", "etcd", "kube-system");
    let session = ClusterExec::spawn(&spawner, target, TIMEOUT, &SpawnOptions::new()).unwrap();

    assert_eq!(session.cli(), "oc");
    assert_eq!(session.shell(), "sh");
    assert_eq!(session.target().to_string(), "kube-system/etcd-0:etcd");

    let call = spawner.last_call().unwrap();
    assert_eq!(call.command, "oc");
    assert_eq!(
        call.args,
        ["exec", "-n", "kube-system", "-it", "etcd-0", "-c", "etcd", "--", "sh"]
    );
}

/// Test cluster exec with an explicit CLI and container shell.
#[test]
fn cluster_exec_honors_custom_cli_and_shell() {
    let spawner = MockSpawner::new();
    spawner.queue_session(MockTransport::new());

    let target = ExecTarget::new("web-7df9", "nginx", "prod");
    let session = ClusterExec::spawn_with(
        &spawner,
        target,
        "kubectl",
        "bash",
        TIMEOUT,
        &SpawnOptions::new(),
    )
    .unwrap();

    assert_eq!(session.cli(), "kubectl");
    let call = spawner.last_call().unwrap();
    assert_eq!(call.command, "kubectl");
    assert_eq!(call.args.last().map(String::as_str), Some("bash"));
}

/// Test that spawn options travel through to the spawner.
#[test]
fn spawn_options_reach_the_spawner() {
    let spawner = MockSpawner::new();
    spawner.queue_session(MockTransport::new());

    let options = SpawnOptions::new().with_env([("TERM", "dumb")]);
    Ssh::spawn(&spawner, "u", "h", &[], TIMEOUT, &options).unwrap();

    let call = spawner.last_call().unwrap();
    assert_eq!(call.env, [("TERM".to_string(), "dumb".to_string())]);
}

/// Test `$SHELL` resolution: honored when set, an error when unset or
/// empty.
///
/// The cases share one test because the variable is process-global; no
/// other test in this binary reads it.
#[test]
fn shell_resolution_follows_the_environment() {
    let original = std::env::var_os("SHELL");

    unsafe { std::env::set_var("SHELL", "/bin/fake-sh") };
    let spawner = MockSpawner::new();
    spawner.queue_session(MockTransport::new());
    let shell = Shell::spawn(&spawner, TIMEOUT, &SpawnOptions::new()).unwrap();
    assert_eq!(shell.program(), "/bin/fake-sh");
    assert_eq!(spawner.last_call().unwrap().command, "/bin/fake-sh");
    assert!(spawner.last_call().unwrap().args.is_empty());

    unsafe { std::env::remove_var("SHELL") };
    let spawner = MockSpawner::new();
    spawner.queue_session(MockTransport::new());
    let err = Shell::spawn(&spawner, TIMEOUT, &SpawnOptions::new()).unwrap_err();
    assert!(matches!(err, ReelError::Config { .. }));

    unsafe { std::env::set_var("SHELL", "") };
    let spawner = MockSpawner::new();
    spawner.queue_session(MockTransport::new());
    assert!(Shell::spawn(&spawner, TIMEOUT, &SpawnOptions::new()).is_err());

    match original {
        Some(value) => unsafe { std::env::set_var("SHELL", value) },
        None => unsafe { std::env::remove_var("SHELL") },
    }
}

/// Test sends reaching the transport and close being idempotent.
#[tokio::test]
async fn session_send_and_close_lifecycle() {
    let spawner = MockSpawner::new();
    let transport = MockTransport::new();
    spawner.queue_session(transport.clone());

    let mut session = Ssh::spawn(&spawner, "u", "h", &[], TIMEOUT, &SpawnOptions::new()).unwrap();
    session.send("uptime\n").await.unwrap();
    assert_eq!(transport.take_input_str(), "uptime\n");

    session.close().await.unwrap();
    session.close().await.unwrap();
    assert!(session.context().is_closed());

    let err = session.send("late\n").await.unwrap_err();
    assert!(matches!(err, ReelError::SessionClosed));
}
