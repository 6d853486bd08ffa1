//! Line-delimited JSON wire variant of the turn protocol.
//!
//! Instead of driving the in-process matcher, a [`WireSession`] delegates
//! pattern matching to a companion subprocess (classically an `expect`
//! script): each turn one Step is written to the companion's stdin as a
//! single JSON line, and one Event is read back from its stdout the same
//! way. Framing and field names are a compatibility surface and must not
//! change.
//!
//! The in-process driver's loop semantics are canonical; this module is
//! the documented compatibility mode and follows the same loop, including
//! the synthetic no-event dispatch for Steps without expectations.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{ReelError, Result, SpawnError};
use crate::handler::Handler;
use crate::step::{Event, Step};

/// A Step as framed on the wire.
///
/// The timeout travels as whole seconds; in-process durations round up so
/// a sub-second deadline never becomes "no deadline".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStep {
    /// Text to send, omitted when there is nothing to send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<String>,
    /// Ordered patterns to wait for, omitted when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expect: Vec<String>,
    /// Deadline in seconds, omitted when zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout: u64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl From<&Step> for WireStep {
    fn from(step: &Step) -> Self {
        let timeout = step.timeout.as_secs() + u64::from(step.timeout.subsec_nanos() > 0);
        Self {
            execute: step.execute.clone(),
            expect: step.expect.clone(),
            timeout,
        }
    }
}

impl From<WireStep> for Step {
    fn from(wire: WireStep) -> Self {
        Self {
            execute: wire.execute,
            expect: wire.expect,
            timeout: Duration::from_secs(wire.timeout),
        }
    }
}

/// An Event as framed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum WireEvent {
    /// A pattern matched.
    Match {
        /// Position of the winning pattern, omitted when zero.
        #[serde(default, skip_serializing_if = "is_zero_usize")]
        idx: usize,
        /// The winning pattern, omitted when empty.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pattern: String,
        /// Output preceding the match, omitted when empty.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        before: String,
        /// The matched text, omitted when empty.
        #[serde(rename = "match", default, skip_serializing_if = "String::is_empty")]
        matched: String,
    },
    /// The deadline elapsed.
    Timeout,
    /// The companion's stream ended.
    Eof,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_usize(value: &usize) -> bool {
    *value == 0
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::Match {
                idx,
                pattern,
                before,
                matched,
            } => Self::Match {
                index: idx,
                pattern,
                before,
                matched,
            },
            WireEvent::Timeout => Self::Timeout,
            WireEvent::Eof => Self::Eof,
        }
    }
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        match event {
            Event::Match {
                index,
                pattern,
                before,
                matched,
            } => Self::Match {
                idx: *index,
                pattern: pattern.clone(),
                before: before.clone(),
                matched: matched.clone(),
            },
            Event::Timeout => Self::Timeout,
            Event::Eof => Self::Eof,
        }
    }
}

/// A protocol run mediated by a companion subprocess.
///
/// One companion serves one run: [`run`](Self::run) drives the handler to
/// completion and closes the session afterwards.
#[derive(Debug)]
pub struct WireSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    closed: bool,
}

impl WireSession {
    /// Spawn `companion` with `args`, optionally teeing the companion's
    /// session log to `logfile` via a prepended `-l <logfile>`.
    pub fn spawn(companion: &str, args: &[String], logfile: Option<&Path>) -> Result<Self> {
        let args = companion_args(logfile, args);
        let mut child = Command::new(companion)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SpawnError::Io)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpawnError::failed("companion stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpawnError::failed("companion stdout unavailable"))?;

        tracing::debug!(companion = %companion, "Spawned wire companion");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            closed: false,
        })
    }

    /// Run `handler` to completion over the companion, then close.
    pub async fn run<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: Handler + ?Sized,
    {
        let first = handler.first();
        let result = self.step(first, handler).await;
        self.close().await?;
        result
    }

    /// Perform `step`, then consequent steps fed by `handler`.
    pub async fn step<H>(&mut self, mut step: Option<Step>, handler: &mut H) -> Result<()>
    where
        H: Handler + ?Sized,
    {
        while let Some(current) = step {
            if self.closed {
                return Err(ReelError::SessionClosed);
            }

            let frame = serde_json::to_string(&WireStep::from(&current))?;
            tracing::trace!(frame = %frame, "Writing wire step");
            self.stdin
                .write_all(frame.as_bytes())
                .await
                .map_err(|e| ReelError::io_context("writing wire step", e))?;
            self.stdin
                .write_all(b"\n")
                .await
                .map_err(|e| ReelError::io_context("writing wire step", e))?;
            self.stdin
                .flush()
                .await
                .map_err(|e| ReelError::io_context("flushing wire step", e))?;

            if !current.has_expectations() {
                // Same synthetic no-event dispatch as the in-process
                // driver.
                step = handler.on_match("", "", "");
                continue;
            }

            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| ReelError::io_context("reading wire event", e))?
                .ok_or_else(|| {
                    ReelError::wire_protocol("companion stream closed without an eof event")
                })?;
            let event: WireEvent = serde_json::from_str(&line)?;
            tracing::trace!(frame = %line, "Read wire event");

            step = match Event::from(event) {
                Event::Match {
                    index,
                    pattern,
                    before,
                    matched,
                } => {
                    tracing::debug!(index, pattern = %pattern, "Wire step matched");
                    handler.on_match(&pattern, &before, &matched)
                }
                Event::Timeout => handler.on_timeout(),
                Event::Eof => {
                    handler.on_eof();
                    return Ok(());
                }
            };
        }
        Ok(())
    }

    /// Close the companion: shut its stdin and wait for it to exit.
    /// Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!("Closing wire session");
        let _ = self.stdin.shutdown().await;
        let _ = self.child.wait().await;
        Ok(())
    }
}

fn companion_args(logfile: Option<&Path>, args: &[String]) -> Vec<std::ffi::OsString> {
    let mut full: Vec<std::ffi::OsString> = Vec::with_capacity(args.len() + 2);
    if let Some(logfile) = logfile {
        full.push("-l".into());
        full.push(logfile.as_os_str().to_os_string());
    }
    full.extend(args.iter().map(Into::into));
    full
}
