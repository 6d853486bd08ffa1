//! Connectivity probe over the `ping` command line tool.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::handler::{Handler, Outcome, Probe};
use crate::step::{CTRL_C, Step};

/// Matches ping's closing statistics line.
///
/// Captures transmitted, received, and (when reported) the error count.
/// Both the `packets` noise word and the errors clause vary across ping
/// implementations, so they are optional.
pub const SUMMARY_PATTERN: &str =
    r"(?m)(\d+) packets transmitted, (\d+)(?: packets)? received(?:, \+(\d+) errors)?.*$";

/// Matches ping rejecting its destination outright.
pub const INVALID_ARGUMENT_PATTERN: &str = r"(?m)connect: Invalid argument.*$";

static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SUMMARY_PATTERN).expect("summary pattern is a valid regex"));

static INVALID_ARGUMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(INVALID_ARGUMENT_PATTERN).expect("invalid-argument pattern is a valid regex")
});

/// Drives one `ping` round trip and classifies the outcome.
///
/// `Error` if nothing was transmitted or errors were reported, `Success`
/// if at least one reply arrived and at most one probe went unanswered
/// (the last reply may still be in flight when the summary prints),
/// `Failure` otherwise. The outcome starts as `Error` so an aborted run
/// never reads as success.
#[derive(Debug)]
pub struct PingProbe {
    host: String,
    count: Option<u32>,
    timeout: Duration,
    outcome: Outcome,
    transmitted: u64,
    received: u64,
    errors: u64,
    retried: bool,
}

impl PingProbe {
    /// Probe `host` with `count` requests, or indefinitely when `count` is
    /// `None`.
    pub fn new(host: impl Into<String>, count: Option<u32>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            count,
            timeout,
            outcome: Outcome::default(),
            transmitted: 0,
            received: 0,
            errors: 0,
            retried: false,
        }
    }

    /// The command line this probe sends.
    #[must_use]
    pub fn command(&self) -> String {
        match self.count {
            Some(count) => format!("ping -c {count} {}", self.host),
            None => format!("ping {}", self.host),
        }
    }

    /// The host under test.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Probes transmitted, from the parsed summary.
    #[must_use]
    pub const fn transmitted(&self) -> u64 {
        self.transmitted
    }

    /// Replies received, from the parsed summary.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// Errors reported, from the parsed summary.
    #[must_use]
    pub const fn errors(&self) -> u64 {
        self.errors
    }

    fn expectations() -> Vec<String> {
        vec![
            INVALID_ARGUMENT_PATTERN.to_string(),
            SUMMARY_PATTERN.to_string(),
        ]
    }

    fn classify(&mut self, matched: &str) {
        if INVALID_ARGUMENT_RE.is_match(matched) {
            self.outcome = Outcome::Error;
        }

        if let Some(captures) = SUMMARY_RE.captures(matched) {
            // Numbers that fail to parse stay zero, which classifies as
            // an error rather than a success.
            self.transmitted = captures
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            self.received = captures
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            self.errors = captures
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);

            self.outcome = if self.transmitted == 0 || self.errors > 0 {
                Outcome::Error
            } else if self.received > 0 && self.transmitted.saturating_sub(self.received) <= 1 {
                Outcome::Success
            } else {
                Outcome::Failure
            };
            tracing::debug!(
                transmitted = self.transmitted,
                received = self.received,
                errors = self.errors,
                outcome = %self.outcome,
                "Classified ping summary"
            );
        }
    }
}

impl Handler for PingProbe {
    fn first(&mut self) -> Option<Step> {
        Some(Step::run(
            self.command(),
            Self::expectations(),
            self.timeout,
        ))
    }

    fn on_match(&mut self, _pattern: &str, _before: &str, matched: &str) -> Option<Step> {
        self.classify(matched);
        None
    }

    fn on_timeout(&mut self) -> Option<Step> {
        if self.retried {
            return None;
        }
        // Interrupt the ping so it prints its statistics, and wait for the
        // summary once more.
        self.retried = true;
        tracing::debug!(host = %self.host, "Ping timed out; interrupting for statistics");
        Some(Step::run(CTRL_C, Self::expectations(), self.timeout))
    }

    fn on_eof(&mut self) {}
}

impl Probe for PingProbe {
    fn outcome(&self) -> Outcome {
        self.outcome
    }
}
