//! Process spawning.
//!
//! The [`Spawner`] trait is the seam between session kinds and process
//! creation: shell, ssh, and cluster-exec sessions all describe the argv
//! they need and hand it to an injected spawner, so tests can substitute a
//! fake and assert on the exact command line. [`PtySpawner`] is the real
//! implementation, allocating a pseudo-terminal for the child.

mod pty;

pub use pty::{AsyncPty, PtySpawner};

use std::time::Duration;

use crate::context::Context;
use crate::error::Result;
use crate::expect::DEFAULT_CAPACITY;

/// Environment variable overriding the default match buffer size.
pub const BUFFER_SIZE_ENV: &str = "REEL_BUFFER_SIZE";

/// Default terminal dimensions for spawned sessions (cols, rows).
pub const DEFAULT_DIMENSIONS: (u16, u16) = (80, 24);

/// Creates interactive sessions from a command line.
///
/// Implementations must be called from within a Tokio runtime: spawning
/// registers the transport with the reactor and starts the background
/// watcher task.
pub trait Spawner: Send + Sync {
    /// Spawn `command` with `args` and wrap it in a [`Context`].
    ///
    /// `timeout` becomes the session default, applied whenever a step
    /// carries a zero timeout.
    fn spawn(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
        options: &SpawnOptions,
    ) -> Result<Context>;
}

/// Tunables applied when a session is spawned.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    buffer_size: usize,
    env: Vec<(String, String)>,
    dimensions: (u16, u16),
}

impl SpawnOptions {
    /// Options with the default buffer size, inherited environment, and an
    /// 80x24 terminal.
    ///
    /// The buffer size honors `REEL_BUFFER_SIZE` when set to a positive
    /// integer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: buffer_size_from_env(),
            env: Vec::new(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Override the match buffer size in bytes.
    #[must_use]
    pub const fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Add environment variables for the child, on top of the inherited
    /// environment.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Override the terminal dimensions (cols, rows).
    #[must_use]
    pub const fn with_dimensions(mut self, cols: u16, rows: u16) -> Self {
        self.dimensions = (cols, rows);
        self
    }

    /// The match buffer size in bytes.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Extra environment variables for the child.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// PTY dimensions as (cols, rows).
    #[must_use]
    pub const fn dimensions(&self) -> (u16, u16) {
        self.dimensions
    }
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn buffer_size_from_env() -> usize {
    std::env::var(BUFFER_SIZE_ENV)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_CAPACITY)
}

/// How a spawned process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExitStatus {
    /// Exited normally with the given code.
    Exited(i32),
    /// Terminated by the given signal.
    Signaled(i32),
    /// The wait result could not be decoded.
    Unknown,
}

impl ProcessExitStatus {
    /// Whether the process exited normally with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl std::fmt::Display for ProcessExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {code}"),
            Self::Signaled(signal) => write!(f, "signal {signal}"),
            Self::Unknown => write!(f, "unknown status"),
        }
    }
}

/// Handle for terminating a spawned child process.
#[derive(Debug)]
pub struct ChildHandle {
    pid: libc::pid_t,
}

impl ChildHandle {
    pub(crate) const fn new(pid: libc::pid_t) -> Self {
        Self { pid }
    }

    /// The child's process ID.
    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid
    }

    /// Send a signal to the child.
    pub fn signal(&self, signal: i32) -> std::io::Result<()> {
        // SAFETY: kill() with an arbitrary pid is always safe to call; a
        // stale pid yields ESRCH rather than undefined behavior.
        let rc = unsafe { libc::kill(self.pid, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    /// Force-kill the child. Errors are ignored; the child may already be
    /// gone.
    pub fn kill(&self) {
        let _ = self.signal(libc::SIGKILL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let options = SpawnOptions::new();
        assert_eq!(options.dimensions(), (80, 24));
        assert!(options.env().is_empty());
        assert!(options.buffer_size() > 0);
    }

    #[test]
    fn options_builders_chain() {
        let options = SpawnOptions::new()
            .with_buffer_size(512)
            .with_env([("TERM", "dumb")])
            .with_dimensions(132, 50);
        assert_eq!(options.buffer_size(), 512);
        assert_eq!(options.env(), &[("TERM".to_string(), "dumb".to_string())]);
        assert_eq!(options.dimensions(), (132, 50));
    }

    #[test]
    fn exit_status_display() {
        assert_eq!(ProcessExitStatus::Exited(0).to_string(), "exit code 0");
        assert_eq!(ProcessExitStatus::Signaled(9).to_string(), "signal 9");
        assert_eq!(ProcessExitStatus::Unknown.to_string(), "unknown status");
        assert!(ProcessExitStatus::Exited(0).success());
        assert!(!ProcessExitStatus::Signaled(15).success());
    }
}
