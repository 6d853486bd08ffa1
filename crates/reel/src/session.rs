//! Session specializations.
//!
//! A session pairs a live [`Context`](crate::Context) with the identity of
//! what it is attached to: the local shell, a remote host, or a pod
//! container reached through the cluster CLI. Specializations add identity
//! and the argv contract only; every protocol decision stays in the driver
//! and handlers.
//!
//! All constructors take the [`Spawner`](crate::Spawner) as a parameter, so
//! tests inject a fake and the engine never consults a global. Callers that
//! pool sessions key them by identity (for cluster sessions,
//! [`ExecTarget`]) and replace the stored entry once it has been closed:
//!
//! ```ignore
//! let mut sessions: HashMap<ExecTarget, ClusterExec> = HashMap::new();
//! if sessions.get(&target).is_none_or(|s| s.context().is_closed()) {
//!     let fresh = ClusterExec::spawn(&spawner, target.clone(), timeout, &options)?;
//!     sessions.insert(target.clone(), fresh);
//! }
//! ```

mod cluster;
mod shell;
mod ssh;

pub use cluster::{ClusterExec, DEFAULT_CLI, DEFAULT_SHELL, ExecTarget};
pub use shell::{SHELL_ENV, Shell};
pub use ssh::Ssh;
