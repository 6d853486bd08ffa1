//! reel: Expect-style automation for interactive CLI sessions.
//!
//! This crate spawns interactive programs on a pseudo-terminal, watches
//! their output for regular-expression patterns, and drives them through a
//! turn-based protocol: a handler proposes a Step (text to send, patterns
//! to await, a deadline), the engine reports back an Event (which pattern
//! won, or a timeout, or end of stream), and the handler proposes the next
//! Step until it is satisfied.
//!
//! # Features
//!
//! - **Async-first design** on the Tokio runtime
//! - **Ordered pattern matching** over a bounded, sliding output buffer
//! - **Composable handlers** with first-match-wins chaining
//! - **Session frontends** for local shells, ssh, and cluster exec
//! - **JSON wire mode** delegating matching to a companion subprocess
//! - **Mock transport and spawner** for tests (feature: `mock`)
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use reel::{PingProbe, Probe, PtySpawner, Reel, Shell, SpawnOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), reel::ReelError> {
//!     let spawner = PtySpawner::new();
//!     let timeout = Duration::from_secs(10);
//!     let mut shell = Shell::spawn(&spawner, timeout, &SpawnOptions::new())?;
//!
//!     let mut probe = PingProbe::new("192.0.2.1", Some(5), timeout);
//!     Reel::new(shell.context_mut()).run(&mut probe).await?;
//!     println!("ping: {}", probe.outcome());
//!
//!     shell.close().await?;
//!     std::process::exit(probe.outcome().exit_code());
//! }
//! ```

// Protocol types
pub mod error;
pub mod handler;
pub mod step;

// Matching engine and session plumbing
pub mod context;
pub mod expect;
pub mod spawn;

// Drivers
pub mod chain;
pub mod driver;
pub mod wire;

// Session frontends
pub mod session;

// Bundled handlers
pub mod handlers;

/// Scripted transports and spawners for testing.
#[cfg(feature = "mock")]
pub mod mock;

pub use chain::Chain;
pub use context::{Context, SessionFault, Transport};
pub use driver::Reel;
pub use error::{ReelError, Result, SpawnError};
pub use expect::{DEFAULT_CAPACITY, Matcher, OutputBuffer};
pub use handler::{Handler, Outcome, Probe};
pub use handlers::{EchoLogger, LineFeeder, Observation, PingProbe};
pub use session::{ClusterExec, ExecTarget, Shell, Ssh};
pub use spawn::{
    AsyncPty, BUFFER_SIZE_ENV, ChildHandle, DEFAULT_DIMENSIONS, ProcessExitStatus, PtySpawner,
    SpawnOptions, Spawner,
};
pub use step::{CTRL_C, CTRL_D, Event, Step};
pub use wire::{WireEvent, WireSession, WireStep};

#[cfg(feature = "mock")]
pub use mock::{MockSpawner, MockTransport, SpawnCall};
