//! The Step/Event turn protocol.
//!
//! A driver run is a sequence of turns. Each turn the active handler chain
//! produces a [`Step`] (what to send, what to wait for, how long), the
//! session executes it, and the wait resolves into exactly one [`Event`]
//! which is dispatched back to the chain to obtain the next Step. A `None`
//! Step ends the run.

use std::time::Duration;

/// Control character sent to interrupt the foreground process (Ctrl-C).
pub const CTRL_C: &str = "\u{3}";

/// Control character signalling end-of-transmission (Ctrl-D).
pub const CTRL_D: &str = "\u{4}";

/// One turn's instruction.
///
/// `execute` is optional text to send to the session; `None` means "send
/// nothing, just wait". `expect` is an ordered list of regex patterns; the
/// first in list order to match anywhere in buffered output wins. A Step
/// with an empty `expect` list produces no [`Event`]: the driver sends
/// `execute` (if any) and immediately asks for the next Step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Text to send to the session before waiting, if any.
    pub execute: Option<String>,
    /// Ordered regex patterns to wait for; first match in list order wins.
    pub expect: Vec<String>,
    /// Deadline for the wait. Zero falls back to the session default.
    pub timeout: Duration,
}

impl Step {
    /// A Step that sends `execute` and waits for one of `expect`.
    pub fn run<I, S>(execute: impl Into<String>, expect: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            execute: Some(execute.into()),
            expect: expect.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// A Step that sends nothing and waits for one of `expect`.
    pub fn wait_for<I, S>(expect: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            execute: None,
            expect: expect.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Whether this Step waits for anything.
    #[must_use]
    pub fn has_expectations(&self) -> bool {
        !self.expect.is_empty()
    }
}

/// The outcome of waiting on a Step's expect set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One of the expected patterns matched.
    Match {
        /// Position of the winning pattern in the Step's `expect` list.
        index: usize,
        /// The winning pattern's text.
        pattern: String,
        /// Output preceding the match, consumed from the buffer.
        before: String,
        /// The matched text itself.
        matched: String,
    },
    /// No pattern matched within the deadline.
    Timeout,
    /// The stream ended with no pattern matched.
    Eof,
}

impl Event {
    /// Check if this event is a match.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    /// Check if this event is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Check if this event is end-of-stream.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}
