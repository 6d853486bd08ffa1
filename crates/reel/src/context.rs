//! The live session handle.
//!
//! A [`Context`] wraps the bidirectional byte stream of a spawned process
//! with buffered expect semantics: `send` writes input verbatim, `expect`
//! blocks until a pattern matches, the deadline elapses, or the stream ends,
//! and the asynchronous fault channel reports a child that died outside any
//! expect call. One `Context` serves any number of driver runs; it is
//! explicitly closed by its owner and unusable afterwards.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{ReelError, Result};
use crate::expect::Matcher;
use crate::spawn::{ChildHandle, ProcessExitStatus};
use crate::step::Event;

/// Read chunk size for the expect loop.
const READ_CHUNK: usize = 4096;

/// A duplex byte stream a session can drive.
///
/// Implemented by the PTY transport, the in-memory fake, and anything else
/// that reads and writes asynchronously.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// An out-of-band session failure.
///
/// Delivered over the fault channel by the session's background watcher
/// when the child terminates or the stream breaks outside an explicit
/// expect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFault {
    /// The child process exited while the session was still open.
    Exited(ProcessExitStatus),
    /// The stream broke or the process could not be awaited.
    Broken(String),
}

impl std::fmt::Display for SessionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(status) => write!(f, "process exited: {status}"),
            Self::Broken(reason) => write!(f, "stream broken: {reason}"),
        }
    }
}

/// A live interactive session handle.
pub struct Context {
    transport: Box<dyn Transport>,
    matcher: Matcher,
    default_timeout: Duration,
    fault_rx: Option<mpsc::Receiver<SessionFault>>,
    fault: Option<SessionFault>,
    watcher: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
    child: Option<ChildHandle>,
    eof: bool,
    closed: bool,
}

impl Context {
    /// Create a context over a transport.
    ///
    /// `buffer_size` bounds the match buffer; `default_timeout` is used by
    /// [`expect`](Self::expect) when a Step carries a zero timeout. Process
    /// and fault plumbing are attached by the spawner via the `with_*`
    /// builders.
    pub fn new<T>(transport: T, buffer_size: usize, default_timeout: Duration) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            transport: Box::new(transport),
            matcher: Matcher::new(buffer_size),
            default_timeout,
            fault_rx: None,
            fault: None,
            watcher: None,
            cancel: None,
            child: None,
            eof: false,
            closed: false,
        }
    }

    /// Attach the fault notification channel.
    #[must_use]
    pub fn with_fault_channel(mut self, rx: mpsc::Receiver<SessionFault>) -> Self {
        self.fault_rx = Some(rx);
        self
    }

    /// Attach the handle used to terminate the child on close.
    #[must_use]
    pub fn with_child(mut self, child: ChildHandle) -> Self {
        self.child = Some(child);
        self
    }

    /// Attach the background watcher task and its cancellation channel.
    ///
    /// The watcher is cancelled and joined when the session closes.
    #[must_use]
    pub fn with_watcher(mut self, task: JoinHandle<()>, cancel: oneshot::Sender<()>) -> Self {
        self.watcher = Some(task);
        self.cancel = Some(cancel);
        self
    }

    /// Write `text` to the process input, verbatim.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        tracing::trace!(bytes = text.len(), "Sending session input");
        self.transport
            .write_all(text.as_bytes())
            .await
            .map_err(|e| ReelError::io_context("writing session input", e))?;
        self.transport
            .flush()
            .await
            .map_err(|e| ReelError::io_context("flushing session input", e))?;
        Ok(())
    }

    /// Block until one of `patterns` matches, `timeout` elapses, or the
    /// stream ends, and return the corresponding [`Event`].
    ///
    /// Pattern priority is list order. A zero `timeout` falls back to the
    /// session default. Timeout and end-of-stream are events, not errors;
    /// only transport failures and unparseable patterns are `Err`.
    pub async fn expect(&mut self, patterns: &[String], timeout: Duration) -> Result<Event> {
        self.ensure_open()?;
        let timeout = if timeout.is_zero() {
            self.default_timeout
        } else {
            timeout
        };
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(event) = self.matcher.find(patterns)? {
                if let Event::Match { index, pattern, .. } = &event {
                    tracing::trace!(index, pattern = %pattern, "Pattern matched");
                }
                return Ok(event);
            }
            if self.eof {
                tracing::debug!("Session stream ended before any pattern matched");
                return Ok(Event::Eof);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Event::Timeout);
            }

            let mut chunk = [0u8; READ_CHUNK];
            match tokio::time::timeout(remaining, self.transport.read(&mut chunk)).await {
                Err(_elapsed) => return Ok(Event::Timeout),
                Ok(Ok(0)) => self.eof = true,
                Ok(Ok(n)) => self.matcher.push(&chunk[..n]),
                Ok(Err(e)) => {
                    return Err(ReelError::io_context("reading session output", e));
                }
            }
        }
    }

    /// Non-blocking view of the fault notification.
    pub fn fault(&mut self) -> Option<&SessionFault> {
        self.poll_fault();
        self.fault.as_ref()
    }

    /// Turn a delivered fault into a run-level error.
    pub fn check_fault(&mut self) -> Result<()> {
        self.poll_fault();
        match &self.fault {
            Some(fault) => Err(ReelError::Fault(fault.clone())),
            None => Ok(()),
        }
    }

    fn poll_fault(&mut self) {
        if self.fault.is_some() {
            return;
        }
        if let Some(rx) = self.fault_rx.as_mut() {
            if let Ok(fault) = rx.try_recv() {
                self.fault = Some(fault);
            }
        }
    }

    /// The timeout applied when a Step carries a zero timeout.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Output buffered since the last match, for diagnostics.
    #[must_use]
    pub fn buffered(&self) -> &str {
        self.matcher.buffered()
    }

    /// Whether the session has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the session: kill the child, join the watcher, shut the
    /// transport. Idempotent; closing twice (or a never-used session) is a
    /// no-op, and the session is unusable afterwards either way.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!("Closing session");

        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(child) = self.child.take() {
            child.kill();
        }
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.await;
        }
        let _ = self.transport.shutdown().await;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ReelError::SessionClosed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("default_timeout", &self.default_timeout)
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .field("fault", &self.fault)
            .finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Not closed explicitly: stop the watcher and make sure the child
        // does not outlive its session. The watcher reaps on its own.
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(child) = self.child.take() {
            child.kill();
        }
    }
}
