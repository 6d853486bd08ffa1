//! Interactive sessions inside cluster pod containers.

use std::time::Duration;

use crate::context::{Context, SessionFault};
use crate::error::Result;
use crate::spawn::{SpawnOptions, Spawner};
use crate::step::Event;

/// Default cluster CLI program.
pub const DEFAULT_CLI: &str = "oc";

/// Default shell started inside the container.
pub const DEFAULT_SHELL: &str = "sh";

/// Identity of a container reached through the cluster CLI.
///
/// Hashable so callers can key session pools by target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecTarget {
    /// Pod name.
    pub pod: String,
    /// Container name within the pod.
    pub container: String,
    /// Namespace the pod lives in.
    pub namespace: String,
}

impl ExecTarget {
    /// Create a target identity.
    pub fn new(
        pod: impl Into<String>,
        container: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            pod: pod.into(),
            container: container.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for ExecTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.pod, self.container)
    }
}

/// An interactive session inside a pod container, via
/// `<cli> exec -n <namespace> -it <pod> -c <container> -- <shell>`.
#[derive(Debug)]
pub struct ClusterExec {
    target: ExecTarget,
    cli: String,
    shell: String,
    context: Context,
}

impl ClusterExec {
    /// Spawn a session into `target` with the default CLI and shell.
    pub fn spawn(
        spawner: &dyn Spawner,
        target: ExecTarget,
        timeout: Duration,
        options: &SpawnOptions,
    ) -> Result<Self> {
        Self::spawn_with(spawner, target, DEFAULT_CLI, DEFAULT_SHELL, timeout, options)
    }

    /// Spawn a session into `target` with an explicit cluster CLI (for
    /// example `kubectl`) and container shell.
    pub fn spawn_with(
        spawner: &dyn Spawner,
        target: ExecTarget,
        cli: impl Into<String>,
        shell: impl Into<String>,
        timeout: Duration,
        options: &SpawnOptions,
    ) -> Result<Self> {
        let cli = cli.into();
        let shell = shell.into();
        let args = exec_args(&target, &shell);

        tracing::debug!(target = %target, cli = %cli, "Spawning cluster exec session");
        let context = spawner.spawn(&cli, &args, timeout, options)?;
        Ok(Self {
            target,
            cli,
            shell,
            context,
        })
    }

    /// The container this session is attached to.
    #[must_use]
    pub const fn target(&self) -> &ExecTarget {
        &self.target
    }

    /// The cluster CLI program in use.
    #[must_use]
    pub fn cli(&self) -> &str {
        &self.cli
    }

    /// The shell running inside the container.
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
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

    /// Write `text` to the container shell's input, verbatim.
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

fn exec_args(target: &ExecTarget, shell: &str) -> Vec<String> {
    vec![
        "exec".to_string(),
        "-n".to_string(),
        target.namespace.clone(),
        "-it".to_string(),
        target.pod.clone(),
        "-c".to_string(),
        target.container.clone(),
        "--".to_string(),
        shell.to_string(),
    ]
}
