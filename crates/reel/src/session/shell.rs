//! Local shell sessions.

use std::time::Duration;

use crate::context::{Context, SessionFault};
use crate::error::{ReelError, Result};
use crate::spawn::{SpawnOptions, Spawner};
use crate::step::Event;

/// Environment variable naming the user's shell.
pub const SHELL_ENV: &str = "SHELL";

/// An interactive session running the user's local shell.
///
/// The shell program comes from `$SHELL` and is spawned with no arguments.
/// An unset or empty `$SHELL` is a configuration error; no fallback program
/// is guessed.
#[derive(Debug)]
pub struct Shell {
    program: String,
    context: Context,
}

impl Shell {
    /// Spawn the user's shell.
    pub fn spawn(
        spawner: &dyn Spawner,
        timeout: Duration,
        options: &SpawnOptions,
    ) -> Result<Self> {
        let program = std::env::var(SHELL_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ReelError::config(format!("{SHELL_ENV} is not set; cannot spawn a local shell"))
            })?;
        tracing::debug!(shell = %program, "Spawning local shell session");
        let context = spawner.spawn(&program, &[], timeout, options)?;
        Ok(Self { program, context })
    }

    /// The shell program being run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The underlying session context.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the underlying session context.
    pub const fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Write `text` to the shell's input, verbatim.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.context.send(text).await
    }

    /// Wait for one of `patterns`, the deadline, or end of stream.
    pub async fn expect(&mut self, patterns: &[String], timeout: Duration) -> Result<Event> {
        self.context.expect(patterns, timeout).await
    }

    /// Non-blocking view of any delivered session fault.
    pub fn fault(&mut self) -> Option<&SessionFault> {
        self.context.fault()
    }

    /// Close the session. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        self.context.close().await
    }
}
