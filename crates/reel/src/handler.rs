//! The handler contract and the tri-state result convention.
//!
//! Every protocol participant implements [`Handler`], from passive
//! observers to domain probes. The four methods are keyed to protocol
//! phase, and a handler signals "nothing more to drive on my behalf" by
//! returning `None`. Handlers are independent concrete types behind the
//! trait; the engine never assumes a shared base or any particular result
//! type, but result-bearing handlers follow the [`Outcome`] convention and
//! expose it through [`Probe`].

use crate::step::Step;

/// A stateful participant in a driver run.
///
/// Implementations are queried for the next [`Step`] at each protocol phase
/// and may update internal state on every call. A `None` return means the
/// handler is satisfied for this turn; it is still queried again on later
/// turns as long as some other handler in the chain keeps the run alive.
pub trait Handler {
    /// The initial Step, before any input has been sent by this handler.
    ///
    /// Returning `None` from every handler in a chain ends the run
    /// immediately with no session I/O.
    fn first(&mut self) -> Option<Step>;

    /// React to a successful match.
    ///
    /// `pattern` is the winning pattern's text, `before` the output that
    /// preceded the match, and `matched` the matched text itself.
    fn on_match(&mut self, pattern: &str, before: &str, matched: &str) -> Option<Step>;

    /// React to no pattern matching within the Step's deadline.
    ///
    /// A common strategy is to send an interrupt and re-issue the same
    /// expect set once, then give up (return `None`) on a second timeout.
    fn on_timeout(&mut self) -> Option<Step>;

    /// Cleanup hook for end-of-stream. Called once, must not block.
    ///
    /// EOF is always terminal: no Step is requested after this call.
    fn on_eof(&mut self);
}

/// Tri-state result recorded by a domain handler.
///
/// Defaults to [`Outcome::Error`] so a run aborted before any decisive
/// match leaves an unambiguous non-success outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// The check passed.
    Success,
    /// The check ran to completion and failed.
    Failure,
    /// The check could not be evaluated.
    #[default]
    Error,
}

impl Outcome {
    /// The process exit code a CLI built on this engine uses for this
    /// outcome: success 0, failure 1, error 2.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Error => 2,
        }
    }

    /// Check if this outcome is a success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        };
        f.write_str(word)
    }
}

/// A handler that records a tri-state outcome.
///
/// Gives callers uniform access to the result after a run without knowing
/// the concrete handler type.
pub trait Probe: Handler {
    /// The outcome recorded so far.
    fn outcome(&self) -> Outcome;
}
