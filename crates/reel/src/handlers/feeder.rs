//! Scripted command feeder.

use std::collections::VecDeque;
use std::time::Duration;

use crate::handler::Handler;
use crate::step::{CTRL_C, Step};

/// Feeds a fixed sequence of command lines to a shell, one per prompt.
///
/// Waits for the prompt, sends the next line, waits for the prompt again.
/// An empty script line sends a single space so the shell still produces a
/// prompt to synchronize on. A command that times out is interrupted once;
/// if the prompt still does not return, the feeder gives up.
#[derive(Debug)]
pub struct LineFeeder {
    lines: VecDeque<String>,
    prompt: String,
    timeout: Duration,
    active: bool,
}

impl LineFeeder {
    /// Create a feeder for `lines`, synchronizing on `prompt` with
    /// `timeout` per command.
    pub fn new<I, S>(lines: I, prompt: impl Into<String>, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompt: prompt.into(),
            timeout,
            active: false,
        }
    }

    /// Commands not yet sent.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    fn next_command(&mut self) -> Option<Step> {
        let line = self.lines.pop_front()?;
        // An empty line would send bare newline after newline; a single
        // space still round-trips through the prompt.
        let command = if line.is_empty() {
            " ".to_string()
        } else {
            line
        };
        self.active = true;
        Some(Step::run(command, [self.prompt.clone()], self.timeout))
    }
}

impl Handler for LineFeeder {
    fn first(&mut self) -> Option<Step> {
        // Synchronize on the initial prompt before sending anything.
        Some(Step::wait_for([self.prompt.clone()], self.timeout))
    }

    fn on_match(&mut self, _pattern: &str, _before: &str, _matched: &str) -> Option<Step> {
        match self.next_command() {
            Some(step) => Some(step),
            None => {
                self.active = false;
                None
            }
        }
    }

    fn on_timeout(&mut self) -> Option<Step> {
        if self.active {
            // One interrupt per command; a second timeout ends the run.
            self.active = false;
            tracing::debug!("Command did not return to the prompt; interrupting");
            return Some(Step::run(
                CTRL_C,
                [self.prompt.clone()],
                self.timeout,
            ));
        }
        None
    }

    fn on_eof(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feeder(lines: &[&str]) -> LineFeeder {
        LineFeeder::new(
            lines.iter().copied(),
            r"\$ $",
            Duration::from_secs(2),
        )
    }

    #[test]
    fn first_waits_for_the_prompt() {
        let mut f = feeder(&["uname -a"]);
        let step = f.first().unwrap();
        assert!(step.execute.is_none());
        assert_eq!(step.expect, vec![r"\$ $".to_string()]);
    }

    #[test]
    fn feeds_lines_in_order_then_stops() {
        let mut f = feeder(&["one", "two"]);
        let step = f.on_match(r"\$ $", "", "$ ").unwrap();
        assert_eq!(step.execute.as_deref(), Some("one"));
        let step = f.on_match(r"\$ $", "", "$ ").unwrap();
        assert_eq!(step.execute.as_deref(), Some("two"));
        assert!(f.on_match(r"\$ $", "", "$ ").is_none());
        assert_eq!(f.remaining(), 0);
    }

    #[test]
    fn empty_line_sends_a_single_space() {
        let mut f = feeder(&[""]);
        let step = f.on_match(r"\$ $", "", "$ ").unwrap();
        assert_eq!(step.execute.as_deref(), Some(" "));
    }

    #[test]
    fn timeout_interrupts_once_per_command() {
        let mut f = feeder(&["sleep 100"]);
        f.on_match(r"\$ $", "", "$ ").unwrap();

        let retry = f.on_timeout().unwrap();
        assert_eq!(retry.execute.as_deref(), Some(CTRL_C));
        assert!(f.on_timeout().is_none());
    }

    #[test]
    fn interrupt_recovery_resumes_the_script() {
        let mut f = feeder(&["sleep 100", "echo ok"]);
        f.on_match(r"\$ $", "", "$ ").unwrap();
        f.on_timeout().unwrap();
        // The interrupt brought the prompt back; the script continues.
        let step = f.on_match(r"\$ $", "", "$ ").unwrap();
        assert_eq!(step.execute.as_deref(), Some("echo ok"));
    }

    #[test]
    fn idle_timeout_produces_nothing() {
        let mut f = feeder(&["ls"]);
        assert!(f.on_timeout().is_none());
    }
}
