//! Integration tests for the driver loop, chains, and bundled handlers.
//!
//! These tests run complete protocol conversations over the mock
//! transport, with no real processes involved.
//!
//! These tests require the `mock` feature to be enabled.

#![cfg(feature = "mock")]

use std::time::Duration;

use reel::mock::{MockSpawner, MockTransport};
use reel::{
    Chain, EchoLogger, Handler, LineFeeder, Outcome, PingProbe, Probe, ProcessExitStatus, Reel,
    SessionFault, SpawnOptions, Spawner, Step,
};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Produces one scripted opening Step, then nothing.
struct Opener {
    first: Option<Step>,
}

impl Opener {
    fn new(first: Step) -> Self {
        Self { first: Some(first) }
    }
}

impl Handler for Opener {
    fn first(&mut self) -> Option<Step> {
        self.first.take()
    }

    fn on_match(&mut self, _pattern: &str, _before: &str, _matched: &str) -> Option<Step> {
        None
    }

    fn on_timeout(&mut self) -> Option<Step> {
        None
    }

    fn on_eof(&mut self) {}
}

/// Sends one command with no expectations and records the dispatch.
#[derive(Default)]
struct SendOnly {
    dispatches: Vec<(String, String, String)>,
}

impl Handler for SendOnly {
    fn first(&mut self) -> Option<Step> {
        Some(Step {
            execute: Some("exit".to_string()),
            expect: Vec::new(),
            timeout: TIMEOUT,
        })
    }

    fn on_match(&mut self, pattern: &str, before: &str, matched: &str) -> Option<Step> {
        self.dispatches
            .push((pattern.to_string(), before.to_string(), matched.to_string()));
        None
    }

    fn on_timeout(&mut self) -> Option<Step> {
        None
    }

    fn on_eof(&mut self) {}
}

/// Test a full ping conversation: send, match the summary, classify.
#[tokio::test]
async fn ping_probe_succeeds_over_a_scripted_session() {
    let transport = MockTransport::new();
    transport.queue_output_str(concat!(
        "PING host.example.com (203.0.113.9): 56 data bytes\n",
        "64 bytes from 203.0.113.9: icmp_seq=1 ttl=64 time=0.521 ms\n",
        "64 bytes from 203.0.113.9: icmp_seq=2 ttl=64 time=0.498 ms\n",
        "64 bytes from 203.0.113.9: icmp_seq=3 ttl=64 time=0.503 ms\n",
        "\n",
        "--- host.example.com ping statistics ---\n",
        "3 packets transmitted, 3 received, 0% packet loss, time 2002ms\n",
    ));
    let mut ctx = transport.context(TIMEOUT);

    let mut logger = EchoLogger::new();
    let mut probe = PingProbe::new("host.example.com", Some(3), TIMEOUT);
    let mut chain = Chain::new().with(&mut logger).with(&mut probe);

    Reel::new(&mut ctx).run(&mut chain).await.unwrap();
    drop(chain);

    assert_eq!(probe.outcome(), Outcome::Success);
    assert_eq!(probe.transmitted(), 3);
    assert_eq!(probe.received(), 3);
    assert_eq!(probe.errors(), 0);
    assert_eq!(transport.take_input_str(), "ping -c 3 host.example.com\n");

    // The observer saw the same dispatch the probe classified.
    let observations = logger.observations();
    assert_eq!(observations.len(), 1);
    assert!(observations[0].matched.contains("3 packets transmitted"));
    assert!(observations[0].before.contains("icmp_seq=3"));
}

/// Test that a failing ping summary classifies as a failure, not an error.
#[tokio::test]
async fn ping_probe_fails_on_heavy_packet_loss() {
    let transport = MockTransport::new();
    transport
        .queue_output_str("5 packets transmitted, 2 received, 60% packet loss, time 4100ms\n");
    let mut ctx = transport.context(TIMEOUT);

    let mut probe = PingProbe::new("203.0.113.9", Some(5), TIMEOUT);
    Reel::new(&mut ctx).run(&mut probe).await.unwrap();

    assert_eq!(probe.outcome(), Outcome::Failure);
}

/// Test that a handler with no first Step causes no session I/O.
#[tokio::test]
async fn no_first_step_means_no_io() {
    let transport = MockTransport::new();
    let mut ctx = transport.context(TIMEOUT);

    let mut logger = EchoLogger::new();
    Reel::new(&mut ctx).run(&mut logger).await.unwrap();

    assert!(transport.take_input().is_empty());
    assert!(logger.observations().is_empty());
}

/// Test that end of stream reaches every handler in the chain.
#[tokio::test]
async fn eof_is_broadcast_to_every_handler() {
    let transport = MockTransport::new();
    transport.signal_eof();
    let mut ctx = transport.context(TIMEOUT);

    let mut opener = Opener::new(Step::wait_for(["never"], TIMEOUT));
    let mut first_logger = EchoLogger::new();
    let mut second_logger = EchoLogger::new();
    let mut chain = Chain::new()
        .with(&mut opener)
        .with(&mut first_logger)
        .with(&mut second_logger);

    Reel::new(&mut ctx).run(&mut chain).await.unwrap();
    drop(chain);

    assert!(first_logger.eof_seen());
    assert!(second_logger.eof_seen());
}

/// Test that a Step without expectations is sent and dispatched
/// synthetically.
#[tokio::test]
async fn empty_expect_step_sends_and_dispatches_synthetically() {
    let transport = MockTransport::new();
    let mut ctx = transport.context(TIMEOUT);

    let mut handler = SendOnly::default();
    Reel::new(&mut ctx).run(&mut handler).await.unwrap();

    assert_eq!(transport.take_input_str(), "exit\n");
    assert_eq!(
        handler.dispatches,
        vec![(String::new(), String::new(), String::new())]
    );
}

/// Test that an unanswered wait dispatches a timeout and ends the run.
#[tokio::test]
async fn timeout_is_dispatched_through_the_chain() {
    let transport = MockTransport::new();
    let mut ctx = transport.context(TIMEOUT);

    let mut opener = Opener::new(Step::wait_for(["never"], Duration::from_millis(50)));
    let mut logger = EchoLogger::new();
    let mut chain = Chain::new().with(&mut opener).with(&mut logger);

    Reel::new(&mut ctx).run(&mut chain).await.unwrap();
    drop(chain);

    assert_eq!(logger.timeouts(), 1);
    assert!(!logger.eof_seen());
}

/// Test the feeder walking a prompt-synchronized script.
#[tokio::test]
async fn line_feeder_walks_a_prompt_script() {
    let transport = MockTransport::new();
    transport.queue_output_str("$ $ $ ");
    let mut ctx = transport.context(TIMEOUT);

    let mut feeder = LineFeeder::new(["echo one", "echo two"], r"\$ ", TIMEOUT);
    Reel::new(&mut ctx).run(&mut feeder).await.unwrap();

    assert_eq!(transport.take_input_str(), "echo one\necho two\n");
    assert_eq!(feeder.remaining(), 0);
}

/// Test that a fault delivered before the run aborts it.
#[tokio::test]
async fn fault_aborts_the_run() {
    let spawner = MockSpawner::new();
    let fault_tx = spawner.queue_faulty_session(MockTransport::new());
    let mut ctx = spawner
        .spawn("sh", &[], TIMEOUT, &SpawnOptions::new())
        .unwrap();

    fault_tx
        .try_send(SessionFault::Exited(ProcessExitStatus::Signaled(9)))
        .unwrap();

    let mut opener = Opener::new(Step::wait_for(["ready"], TIMEOUT));
    let err = Reel::new(&mut ctx).run(&mut opener).await.unwrap_err();
    assert!(err.is_fault());
}
