//! Integration tests for the JSON wire mode.
//!
//! Each test spawns a tiny `sh` script as the companion process and holds
//! a complete conversation with it over stdin/stdout.

#![cfg(unix)]

use std::time::Duration;

use reel::{Handler, ReelError, Step, WireSession, WireStep};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Records every dispatch and follows a fixed two-step script.
#[derive(Default)]
struct Script {
    matches: Vec<(String, String, String)>,
    timeouts: usize,
    eof_seen: bool,
}

impl Handler for Script {
    fn first(&mut self) -> Option<Step> {
        Some(Step::run("hello", ["ok"], TIMEOUT))
    }

    fn on_match(&mut self, pattern: &str, before: &str, matched: &str) -> Option<Step> {
        self.matches
            .push((pattern.to_string(), before.to_string(), matched.to_string()));
        Some(Step::wait_for(["done"], TIMEOUT))
    }

    fn on_timeout(&mut self) -> Option<Step> {
        self.timeouts += 1;
        Some(Step::wait_for(["done"], TIMEOUT))
    }

    fn on_eof(&mut self) {
        self.eof_seen = true;
    }
}

fn companion(script: &str) -> reel::Result<WireSession> {
    WireSession::spawn("sh", &["-c".to_string(), script.to_string()], None)
}

/// Test a conversation that matches once and then ends.
#[tokio::test]
async fn wire_run_dispatches_match_then_eof() {
    let script = r#"read -r _; printf '%s\n' '{"event":"match","idx":1,"pattern":"ok","before":"pre","match":"ok"}'; read -r _; printf '%s\n' '{"event":"eof"}'"#;
    let mut session = companion(script).unwrap();

    let mut handler = Script::default();
    session.run(&mut handler).await.unwrap();

    assert_eq!(
        handler.matches,
        vec![("ok".to_string(), "pre".to_string(), "ok".to_string())]
    );
    assert!(handler.eof_seen);
}

/// Test a timeout event flowing through the same loop.
#[tokio::test]
async fn wire_run_dispatches_timeouts() {
    let script = r#"read -r _; printf '%s\n' '{"event":"timeout"}'; read -r _; printf '%s\n' '{"event":"eof"}'"#;
    let mut session = companion(script).unwrap();

    let mut handler = Script::default();
    session.run(&mut handler).await.unwrap();

    assert_eq!(handler.timeouts, 1);
    assert!(handler.matches.is_empty());
    assert!(handler.eof_seen);
}

/// Test that a companion exiting without an eof event is a protocol
/// violation.
#[tokio::test]
async fn companion_closing_early_is_a_protocol_violation() {
    let script = r#"read -r _; exit 0"#;
    let mut session = companion(script).unwrap();

    let mut handler = Script::default();
    let err = session.run(&mut handler).await.unwrap_err();
    assert!(matches!(err, ReelError::WireProtocol { .. }));
    assert!(!handler.eof_seen);
}

/// Test the synthetic dispatch for a Step with no expectations: the frame
/// still goes to the companion, but no event is read back.
#[tokio::test]
async fn empty_expect_step_skips_the_event_read() {
    struct SendOnly {
        dispatches: Vec<(String, String, String)>,
    }

    impl Handler for SendOnly {
        fn first(&mut self) -> Option<Step> {
            Some(Step {
                execute: Some("quit".to_string()),
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

    // The companion consumes frames and never answers.
    let mut session = companion("cat > /dev/null").unwrap();
    let mut handler = SendOnly {
        dispatches: Vec::new(),
    };
    session.run(&mut handler).await.unwrap();

    assert_eq!(
        handler.dispatches,
        vec![(String::new(), String::new(), String::new())]
    );
}

/// Test that a closed session refuses further steps.
#[tokio::test]
async fn closed_wire_session_refuses_steps() {
    let mut session = companion("cat > /dev/null").unwrap();
    session.close().await.unwrap();
    session.close().await.unwrap();

    let mut handler = Script::default();
    let err = session
        .step(Some(Step::run("x", ["y"], TIMEOUT)), &mut handler)
        .await
        .unwrap_err();
    assert!(matches!(err, ReelError::SessionClosed));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any Step with a whole-second timeout survives the wire intact.
        #[test]
        fn wire_steps_round_trip(
            execute in proptest::option::of("[a-z ]{0,16}"),
            patterns in proptest::collection::vec("[a-z]{1,8}", 0..4),
            secs in 0u64..3600,
        ) {
            let step = Step {
                execute,
                expect: patterns,
                timeout: Duration::from_secs(secs),
            };
            let frame = serde_json::to_string(&WireStep::from(&step)).unwrap();
            let parsed: WireStep = serde_json::from_str(&frame).unwrap();
            prop_assert_eq!(Step::from(parsed), step);
        }

        /// Sub-second deadlines round up, never down to "no deadline".
        #[test]
        fn timeouts_never_round_down_to_zero(ms in 1u64..10_000) {
            let step = Step::wait_for(["x"], Duration::from_millis(ms));
            let wire = WireStep::from(&step);
            prop_assert!(wire.timeout >= 1);
            prop_assert!(u128::from(wire.timeout) * 1000 >= u128::from(ms));
        }
    }
}
