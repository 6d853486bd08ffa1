//! Scripted transports and spawners for testing without real processes.
//!
//! [`MockTransport`] stands in for a PTY: tests queue the bytes the
//! "process" produces and inspect the bytes the driver sent. A cloned
//! handle shares state with the transport inside the session, so output
//! can be queued while a run is in flight. [`MockSpawner`] satisfies the
//! [`Spawner`] seam, records every spawn request, and hands out prepared
//! transports in order, so session tests can assert on the exact argv
//! without touching a terminal.
//!
//! # Example
//!
//! ```ignore
//! use reel::mock::MockTransport;
//!
//! let transport = MockTransport::new();
//! transport.queue_output_str("login: ");
//! let mut ctx = transport.context(Duration::from_secs(2));
//! ```

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Poll, Waker};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

use crate::context::{Context, SessionFault};
use crate::error::{Result, SpawnError};
use crate::expect::DEFAULT_CAPACITY;
use crate::spawn::{SpawnOptions, Spawner};

/// Shared state behind a [`MockTransport`] and all of its clones.
#[derive(Debug, Default)]
struct TransportState {
    /// Bytes waiting to be read by the session.
    output: VecDeque<u8>,
    /// Bytes the session has written.
    input: VecDeque<u8>,
    /// Whether end of stream has been signaled.
    eof: bool,
    /// Error to surface on the next read.
    error: Option<String>,
    /// Reader parked on an empty buffer, woken when output arrives.
    reader: Option<Waker>,
}

/// An in-memory stand-in for a process transport.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Create an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes for the session to read.
    pub fn queue_output(&self, data: &[u8]) {
        let waker = {
            let mut state = self.lock();
            state.output.extend(data);
            state.reader.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Queue a string for the session to read.
    pub fn queue_output_str(&self, s: &str) {
        self.queue_output(s.as_bytes());
    }

    /// Signal end of stream. Queued output is still delivered first.
    pub fn signal_eof(&self) {
        let waker = {
            let mut state = self.lock();
            state.eof = true;
            state.reader.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Surface an I/O error on the session's next read.
    pub fn set_error(&self, message: impl Into<String>) {
        let waker = {
            let mut state = self.lock();
            state.error = Some(message.into());
            state.reader.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Drain everything the session has written.
    #[must_use]
    pub fn take_input(&self) -> Vec<u8> {
        self.lock().input.drain(..).collect()
    }

    /// Drain everything the session has written, lossily decoded.
    #[must_use]
    pub fn take_input_str(&self) -> String {
        String::from_utf8_lossy(&self.take_input()).into_owned()
    }

    /// Whether end of stream has been signaled.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.lock().eof
    }

    /// Wrap a clone of this transport in a [`Context`].
    ///
    /// The returned context shares state with `self`, so the test keeps
    /// queueing output and inspecting input through its own handle.
    #[must_use]
    pub fn context(&self, default_timeout: Duration) -> Context {
        Context::new(self.clone(), DEFAULT_CAPACITY, default_timeout)
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.lock();

        if let Some(message) = state.error.take() {
            return Poll::Ready(Err(io::Error::other(message)));
        }

        if !state.output.is_empty() {
            let len = buf.remaining().min(state.output.len());
            for byte in state.output.drain(..len) {
                buf.put_slice(&[byte]);
            }
            return Poll::Ready(Ok(()));
        }

        if state.eof {
            return Poll::Ready(Ok(()));
        }

        state.reader = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.lock().input.extend(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// One recorded spawn request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCall {
    /// The command that was requested.
    pub command: String,
    /// The arguments that were requested.
    pub args: Vec<String>,
    /// The session default timeout.
    pub timeout: Duration,
    /// Extra environment variables from the options.
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct SpawnerState {
    calls: Vec<SpawnCall>,
    sessions: VecDeque<ScriptedSession>,
}

#[derive(Debug)]
struct ScriptedSession {
    transport: MockTransport,
    fault_rx: Option<mpsc::Receiver<SessionFault>>,
}

/// A [`Spawner`] that records calls and hands out prepared transports.
///
/// Each queued session serves exactly one spawn; a spawn with nothing
/// queued fails.
#[derive(Debug, Clone, Default)]
pub struct MockSpawner {
    state: Arc<Mutex<SpawnerState>>,
}

impl MockSpawner {
    /// Create a spawner with no sessions queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SpawnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a transport to back the next spawned session.
    pub fn queue_session(&self, transport: MockTransport) {
        self.lock().sessions.push_back(ScriptedSession {
            transport,
            fault_rx: None,
        });
    }

    /// Queue a transport whose session carries a fault channel.
    ///
    /// The returned sender injects out-of-band faults into the session, as
    /// the background watcher would for a real process.
    pub fn queue_faulty_session(&self, transport: MockTransport) -> mpsc::Sender<SessionFault> {
        let (tx, rx) = mpsc::channel(1);
        self.lock().sessions.push_back(ScriptedSession {
            transport,
            fault_rx: Some(rx),
        });
        tx
    }

    /// All spawn requests seen so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SpawnCall> {
        self.lock().calls.clone()
    }

    /// The most recent spawn request.
    #[must_use]
    pub fn last_call(&self) -> Option<SpawnCall> {
        self.lock().calls.last().cloned()
    }
}

impl Spawner for MockSpawner {
    fn spawn(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
        options: &SpawnOptions,
    ) -> Result<Context> {
        let mut state = self.lock();
        state.calls.push(SpawnCall {
            command: command.to_string(),
            args: args.to_vec(),
            timeout,
            env: options.env().to_vec(),
        });
        let session = state.sessions.pop_front().ok_or_else(|| {
            SpawnError::failed(format!("no scripted session queued for `{command}`"))
        })?;

        let mut ctx = Context::new(session.transport, options.buffer_size(), timeout);
        if let Some(rx) = session.fault_rx {
            ctx = ctx.with_fault_channel(rx);
        }
        Ok(ctx)
    }
}
