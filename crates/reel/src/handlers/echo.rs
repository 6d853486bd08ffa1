//! Pure observer handler that mirrors session traffic into the logs.

use crate::handler::Handler;
use crate::step::Step;

/// One observed match: what the driver dispatched, untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// The pattern that matched.
    pub pattern: String,
    /// Output preceding the match.
    pub before: String,
    /// The matched text.
    pub matched: String,
}

/// Logs and records every event it sees, and never produces a Step.
///
/// Placed first in a chain it makes the session's traffic visible without
/// influencing any later handler's decision. Recorded observations are
/// available after the run for inspection.
#[derive(Debug, Default)]
pub struct EchoLogger {
    observations: Vec<Observation>,
    timeouts: usize,
    eof_seen: bool,
}

impl EchoLogger {
    /// Create an observer with nothing recorded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every match observed so far, in dispatch order.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// How many timeouts were observed.
    #[must_use]
    pub const fn timeouts(&self) -> usize {
        self.timeouts
    }

    /// Whether end of stream was observed.
    #[must_use]
    pub const fn eof_seen(&self) -> bool {
        self.eof_seen
    }
}

impl Handler for EchoLogger {
    fn first(&mut self) -> Option<Step> {
        None
    }

    fn on_match(&mut self, pattern: &str, before: &str, matched: &str) -> Option<Step> {
        if before.is_empty() {
            tracing::info!(matched = %matched, "Session output");
        } else {
            tracing::info!(before = %before, matched = %matched, "Session output");
        }
        self.observations.push(Observation {
            pattern: pattern.to_string(),
            before: before.to_string(),
            matched: matched.to_string(),
        });
        None
    }

    fn on_timeout(&mut self) -> Option<Step> {
        tracing::info!("Session timed out waiting for output");
        self.timeouts += 1;
        None
    }

    fn on_eof(&mut self) {
        tracing::info!("Session output ended");
        self.eof_seen = true;
    }
}
