//! Remote shell sessions over the `ssh` client.

use std::time::Duration;

use crate::context::{Context, SessionFault};
use crate::error::Result;
use crate::spawn::{SpawnOptions, Spawner};
use crate::step::Event;

/// An interactive session on a remote host, driven through the local `ssh`
/// client.
///
/// The command line is `ssh <user>@<host>` followed by any extra arguments
/// the caller supplies (identity files, port overrides, and the like).
/// Authentication is the ssh client's business; the session only carries
/// the identity and the byte stream.
#[derive(Debug)]
pub struct Ssh {
    user: String,
    host: String,
    context: Context,
}

impl Ssh {
    /// Spawn an ssh session to `user@host`.
    pub fn spawn(
        spawner: &dyn Spawner,
        user: impl Into<String>,
        host: impl Into<String>,
        extra_args: &[String],
        timeout: Duration,
        options: &SpawnOptions,
    ) -> Result<Self> {
        let user = user.into();
        let host = host.into();
        let mut args = Vec::with_capacity(extra_args.len() + 1);
        args.push(format!("{user}@{host}"));
        args.extend(extra_args.iter().cloned());

        tracing::debug!(user = %user, host = %host, "Spawning ssh session");
        let context = spawner.spawn("ssh", &args, timeout, options)?;
        Ok(Self {
            user,
            host,
            context,
        })
    }

    /// The remote user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The remote host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
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

    /// Write `text` to the remote shell's input, verbatim.
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
