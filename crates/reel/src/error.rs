//! Error types for reel.
//!
//! The taxonomy mirrors how failures reach callers: spawn errors are fatal
//! and immediate, transport faults arrive asynchronously and abort in-flight
//! runs, and everything a handler can recover from (no match within the
//! deadline, end of stream) is an [`Event`](crate::Event) rather than an
//! error. Handler-level classification problems never surface here at all;
//! they stay in the handler's tri-state outcome.

use thiserror::Error;

use crate::context::SessionFault;

/// Any failure the engine surfaces to a caller.
#[derive(Debug, Error)]
pub enum ReelError {
    /// Starting the session process failed.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O operation on a live session failed.
    #[error("{context}: {source}")]
    Io {
        /// The operation that was under way.
        context: String,
        /// What the transport reported.
        #[source]
        source: std::io::Error,
    },

    /// The session's process died or its stream broke outside an
    /// explicit expect call.
    #[error("session fault: {0}")]
    Fault(SessionFault),

    /// An expect pattern failed to compile.
    #[error("invalid expect pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The session was closed before or during the call.
    #[error("session is closed")]
    SessionClosed,

    /// The engine cannot run as configured.
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },

    /// A line on the wire protocol could not be parsed.
    #[error("malformed wire frame: {0}")]
    WireFrame(#[from] serde_json::Error),

    /// The wire companion broke the one-event-per-step contract.
    #[error("wire protocol violation: {message}")]
    WireProtocol {
        /// Description of the violation.
        message: String,
    },
}

/// Failure to start a session process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The PTY pair could not be allocated.
    #[error("PTY allocation failed: {reason}")]
    PtyAllocation {
        /// What the allocation call reported.
        reason: String,
    },

    /// Part of the command line cannot cross the exec boundary.
    #[error("invalid {kind} {value:?}: {reason}")]
    InvalidArgument {
        /// Which part was rejected: "command", "argument[i]",
        /// "environment".
        kind: String,
        /// The offending text.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An I/O error while wiring the session up.
    #[error("spawn I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The spawner could not produce a session.
    #[error("spawn failed: {reason}")]
    Failed {
        /// Spawner-specific explanation.
        reason: String,
    },
}

/// Result type alias for reel operations.
pub type Result<T> = std::result::Result<T, ReelError>;

impl ReelError {
    /// Configuration error with the given description.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wire protocol violation with the given description.
    pub fn wire_protocol(message: impl Into<String>) -> Self {
        Self::WireProtocol {
            message: message.into(),
        }
    }

    /// Session I/O error, tagged with the operation that was under way.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this is an asynchronous session fault.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    /// Whether this is a spawn error.
    #[must_use]
    pub const fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn(_))
    }
}

impl SpawnError {
    /// PTY allocation failure with the given reason.
    pub fn pty_allocation(reason: impl Into<String>) -> Self {
        Self::PtyAllocation {
            reason: reason.into(),
        }
    }

    /// Rejected command-line part.
    pub fn invalid_argument(
        kind: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            kind: kind.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Spawner-level failure with the given reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}
