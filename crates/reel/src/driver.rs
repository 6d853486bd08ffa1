//! The run loop binding one session to one handler.
//!
//! [`Reel`] drives the turn protocol: ask the handler for a Step, send its
//! command, wait for an [`Event`](crate::Event), dispatch it, repeat until
//! the handler produces no next Step or the stream ends. A chain is itself
//! a handler, so a run drives one handler or many the same way.
//!
//! Run-level errors (spawn faults, transport failures, a child dying
//! between turns) surface as the run's `Err` and are distinct from whatever
//! outcome the handlers recorded; callers check both.

use std::borrow::Cow;

use crate::context::Context;
use crate::error::Result;
use crate::handler::Handler;
use crate::step::{Event, Step};

/// Drives handlers against one live session.
#[derive(Debug)]
pub struct Reel<'ctx> {
    ctx: &'ctx mut Context,
}

impl<'ctx> Reel<'ctx> {
    /// Bind a driver to a session context.
    ///
    /// The exclusive borrow enforces the protocol invariant: at most one
    /// Step in flight per session.
    pub fn new(ctx: &'ctx mut Context) -> Self {
        Self { ctx }
    }

    /// Run `handler` to completion, starting from its first Step.
    ///
    /// If the first Step is `None` the run ends immediately with no
    /// session I/O.
    pub async fn run<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: Handler + ?Sized,
    {
        let first = handler.first();
        self.step(first, handler).await
    }

    /// Perform `step`, then consequent steps fed by `handler`, until the
    /// handler produces no next Step or the stream ends.
    pub async fn step<H>(&mut self, mut step: Option<Step>, handler: &mut H) -> Result<()>
    where
        H: Handler + ?Sized,
    {
        while let Some(current) = step {
            // A fault delivered between turns aborts the run before any
            // further I/O.
            self.ctx.check_fault()?;

            if let Some(execute) = &current.execute {
                tracing::debug!(command = %execute.trim_end(), "Sending step command");
                self.ctx.send(&executable_command(execute)).await?;
            }

            if current.has_expectations() {
                let event = self.ctx.expect(&current.expect, current.timeout).await?;
                step = match event {
                    Event::Match {
                        index,
                        pattern,
                        before,
                        matched,
                    } => {
                        tracing::debug!(index, pattern = %pattern, "Step matched");
                        handler.on_match(&pattern, &before, &matched)
                    }
                    Event::Timeout => {
                        tracing::debug!("Step timed out");
                        handler.on_timeout()
                    }
                    Event::Eof => {
                        // End of stream is terminal no matter what the
                        // handlers would do next.
                        tracing::debug!("Session reached end of stream");
                        handler.on_eof();
                        return Ok(());
                    }
                };
            } else {
                // Nothing to wait for: request the next Step through a
                // synthetic no-event dispatch.
                step = handler.on_match("", "", "");
            }

            self.ctx.check_fault()?;
        }
        Ok(())
    }
}

/// The command text actually sent for a Step, with a trailing newline
/// appended when missing so the line discipline delivers it.
fn executable_command(execute: &str) -> Cow<'_, str> {
    if execute.ends_with('\n') {
        Cow::Borrowed(execute)
    } else {
        Cow::Owned(format!("{execute}\n"))
    }
}
