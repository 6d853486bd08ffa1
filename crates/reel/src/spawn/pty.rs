//! PTY-backed process spawning.
//!
//! Allocates a pseudo-terminal pair, forks, and execs the target command
//! with the slave as its controlling terminal, so line-oriented tools see a
//! real TTY. The master side is wrapped in [`AsyncPty`] for Tokio, and a
//! background watcher task turns an unexpected child exit into a
//! [`SessionFault`] on the context's fault channel.

use std::ffi::CString;
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::context::{Context, SessionFault};
use crate::error::{Result, SpawnError};
use crate::spawn::{ChildHandle, ProcessExitStatus, SpawnOptions, Spawner};

/// Spawns commands under a pseudo-terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtySpawner;

impl PtySpawner {
    /// Create a PTY spawner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Spawner for PtySpawner {
    fn spawn(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
        options: &SpawnOptions,
    ) -> Result<Context> {
        // Everything the child needs is prepared before forking: CString
        // validation can still fail cleanly here, and the child must not
        // allocate between fork and exec.
        let tables = ExecTables::prepare(command, args, options.env())?;

        let (cols, rows) = options.dimensions();
        let mut winsize = libc::winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: openpty() is called with valid pointers to stack-allocated
        // integers and a stack-allocated winsize. The null pointers for name
        // and termp are explicitly allowed per POSIX. The return value is
        // checked and errors are handled.
        let (master_fd, slave_fd) = unsafe {
            let mut master: libc::c_int = 0;
            let mut slave: libc::c_int = 0;
            if libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut winsize,
            ) != 0
            {
                return Err(SpawnError::pty_allocation("openpty failed").into());
            }
            (master, slave)
        };

        // SAFETY: fork() duplicates this process. The child immediately sets
        // up its terminal and execs; it touches only the pre-built exec
        // tables and async-signal-safe calls.
        let pid = unsafe { libc::fork() };

        match pid {
            -1 => {
                // SAFETY: both fds came from openpty() above and are still
                // owned by this process.
                unsafe {
                    libc::close(master_fd);
                    libc::close(slave_fd);
                }
                Err(SpawnError::Io(io::Error::last_os_error()).into())
            }
            0 => {
                // Child process.
                // SAFETY: runs only in the forked child. We close the master
                // (parent's end), start a new session, make the slave our
                // controlling terminal, wire it to stdio, and exec. On exec
                // failure the child exits with 127 without unwinding.
                unsafe {
                    libc::close(master_fd);
                    libc::setsid();
                    libc::ioctl(slave_fd, libc::TIOCSCTTY, 0);

                    libc::dup2(slave_fd, 0);
                    libc::dup2(slave_fd, 1);
                    libc::dup2(slave_fd, 2);
                    if slave_fd > 2 {
                        libc::close(slave_fd);
                    }

                    libc::execvpe(
                        tables.command.as_ptr(),
                        tables.argv_ptrs.as_ptr(),
                        tables.envp_ptrs.as_ptr(),
                    );
                    libc::_exit(127);
                }
            }
            child_pid => {
                // Parent process.
                // SAFETY: slave_fd is only needed by the child. master_fd is
                // valid; O_NONBLOCK is required for AsyncFd, and FD_CLOEXEC
                // keeps the master out of any child spawned later.
                unsafe {
                    libc::close(slave_fd);
                    let flags = libc::fcntl(master_fd, libc::F_GETFL);
                    libc::fcntl(master_fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    let fd_flags = libc::fcntl(master_fd, libc::F_GETFD);
                    libc::fcntl(master_fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC);
                }

                // SAFETY: master_fd came from openpty() and nothing else
                // closes it; the OwnedFd takes over that responsibility.
                let master = unsafe { OwnedFd::from_raw_fd(master_fd) };
                let child = ChildHandle::new(child_pid);

                let transport = match AsyncPty::new(master) {
                    Ok(transport) => transport,
                    Err(e) => {
                        child.kill();
                        reap_nonblocking(child_pid);
                        return Err(SpawnError::Io(e).into());
                    }
                };

                tracing::debug!(
                    command = %command,
                    pid = child_pid,
                    cols,
                    rows,
                    "Spawned PTY session"
                );

                let (fault_tx, fault_rx) = mpsc::channel(1);
                let (cancel_tx, cancel_rx) = oneshot::channel();
                let waiter = tokio::task::spawn_blocking(move || wait_child(child_pid));
                let watcher = tokio::spawn(watch_child(waiter, cancel_rx, fault_tx));

                Ok(Context::new(transport, options.buffer_size(), timeout)
                    .with_child(child)
                    .with_fault_channel(fault_rx)
                    .with_watcher(watcher, cancel_tx))
            }
        }
    }
}

/// Exec argument and environment tables, validated and laid out before the
/// fork so the child can use them without allocating.
struct ExecTables {
    command: CString,
    // Backing storage for the pointer tables below. CString data lives on
    // the heap, so the pointers stay valid if these vectors move.
    _argv: Vec<CString>,
    _envp: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>,
    envp_ptrs: Vec<*const libc::c_char>,
}

impl ExecTables {
    fn prepare(command: &str, args: &[String], extra_env: &[(String, String)]) -> Result<Self> {
        let command_cstring = CString::new(command).map_err(|_| {
            SpawnError::invalid_argument("command", command, "command contains null byte")
        })?;

        let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
        argv.push(command_cstring.clone());
        for (idx, arg) in args.iter().enumerate() {
            let arg_cstring = CString::new(arg.as_str()).map_err(|_| {
                SpawnError::invalid_argument(
                    format!("argument[{idx}]"),
                    arg.clone(),
                    "argument contains null byte",
                )
            })?;
            argv.push(arg_cstring);
        }

        // Inherited environment plus the session's extra variables, with
        // extras overriding. Entries that cannot be represented are skipped.
        let mut env: Vec<(String, String)> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .filter(|(k, _)| !extra_env.iter().any(|(ek, _)| ek == k))
            .collect();
        env.extend(extra_env.iter().cloned());

        let mut envp: Vec<CString> = Vec::with_capacity(env.len());
        for (key, value) in &env {
            let entry = CString::new(format!("{key}={value}")).map_err(|_| {
                SpawnError::invalid_argument(
                    "environment",
                    key.clone(),
                    "environment entry contains null byte",
                )
            })?;
            envp.push(entry);
        }

        let argv_ptrs: Vec<*const libc::c_char> = argv
            .iter()
            .map(|s| s.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        let envp_ptrs: Vec<*const libc::c_char> = envp
            .iter()
            .map(|s| s.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        Ok(Self {
            command: command_cstring,
            _argv: argv,
            _envp: envp,
            argv_ptrs,
            envp_ptrs,
        })
    }
}

/// Blocking wait for the child, retried across signal interruptions.
fn wait_child(pid: libc::pid_t) -> ProcessExitStatus {
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: pid came from fork(). status is a valid pointer to a
        // stack-allocated integer, and options 0 means a plain blocking
        // wait.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return ProcessExitStatus::Unknown;
        }
        return decode_wait_status(status);
    }
}

fn decode_wait_status(status: libc::c_int) -> ProcessExitStatus {
    if libc::WIFEXITED(status) {
        ProcessExitStatus::Exited(libc::WEXITSTATUS(status))
    } else if libc::WIFSIGNALED(status) {
        ProcessExitStatus::Signaled(libc::WTERMSIG(status))
    } else {
        ProcessExitStatus::Unknown
    }
}

/// Escalate an unexpected child exit onto the fault channel, or reap
/// quietly when the session is closing.
async fn watch_child(
    mut waiter: JoinHandle<ProcessExitStatus>,
    cancel_rx: oneshot::Receiver<()>,
    fault_tx: mpsc::Sender<SessionFault>,
) {
    tokio::select! {
        result = &mut waiter => {
            let fault = match result {
                Ok(status) => {
                    tracing::error!(%status, "Session process exited while the session was open");
                    SessionFault::Exited(status)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Session process waiter failed");
                    SessionFault::Broken(e.to_string())
                }
            };
            let _ = fault_tx.send(fault).await;
        }
        _ = cancel_rx => {
            // The session is closing and has killed the child; wait so it
            // gets reaped, without raising a fault.
            let _ = waiter.await;
        }
    }
}

/// Collect the child if it has already exited, without blocking.
fn reap_nonblocking(pid: libc::pid_t) {
    let mut status: libc::c_int = 0;
    // SAFETY: pid came from fork(); WNOHANG never blocks.
    let _ = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
}

/// Async wrapper around the PTY master for use with Tokio.
pub struct AsyncPty {
    inner: AsyncFd<OwnedFd>,
}

impl AsyncPty {
    /// Register the master descriptor with the Tokio reactor.
    ///
    /// The descriptor must already be in non-blocking mode.
    pub fn new(master: OwnedFd) -> io::Result<Self> {
        Ok(Self {
            inner: AsyncFd::new(master)?,
        })
    }

    fn raw_fd(&self) -> RawFd {
        self.inner.get_ref().as_raw_fd()
    }
}

impl AsyncRead for AsyncPty {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.inner.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let fd = self.raw_fd();
            let unfilled = buf.initialize_unfilled();

            // SAFETY: fd is a valid descriptor and unfilled is a live,
            // properly sized buffer.
            let result = unsafe {
                libc::read(
                    fd,
                    unfilled.as_mut_ptr().cast::<libc::c_void>(),
                    unfilled.len(),
                )
            };

            if result >= 0 {
                #[allow(clippy::cast_sign_loss)]
                buf.advance(result as usize);
                return Poll::Ready(Ok(()));
            }

            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                guard.clear_ready();
                continue;
            }
            // Linux reports EIO on the master once the child side is gone;
            // that is end of stream, not a failure.
            if err.raw_os_error() == Some(libc::EIO) {
                return Poll::Ready(Ok(()));
            }
            return Poll::Ready(Err(err));
        }
    }
}

impl AsyncWrite for AsyncPty {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.inner.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let fd = self.raw_fd();

            // SAFETY: fd is a valid descriptor and buf is a live buffer.
            let result =
                unsafe { libc::write(fd, buf.as_ptr().cast::<libc::c_void>(), buf.len()) };

            if result >= 0 {
                #[allow(clippy::cast_sign_loss)]
                return Poll::Ready(Ok(result as usize));
            }

            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                guard.clear_ready();
                continue;
            }
            return Poll::Ready(Err(err));
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        // PTY writes are not buffered on our side.
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        // The descriptor closes when the OwnedFd drops.
        Poll::Ready(Ok(()))
    }
}

impl std::fmt::Debug for AsyncPty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncPty")
            .field("fd", &self.raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelError;

    #[tokio::test]
    async fn nul_in_command_fails_before_fork() {
        let spawner = PtySpawner::new();
        let result = spawner.spawn(
            "test\0command",
            &[],
            Duration::from_secs(1),
            &SpawnOptions::new(),
        );

        let err = result.unwrap_err();
        assert!(err.is_spawn());
        assert!(err.to_string().contains("null byte"));
    }

    #[tokio::test]
    async fn nul_in_argument_fails_before_fork() {
        let spawner = PtySpawner::new();
        let result = spawner.spawn(
            "/bin/echo",
            &["hello\0world".to_string()],
            Duration::from_secs(1),
            &SpawnOptions::new(),
        );

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ReelError::Spawn(SpawnError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn wait_status_decoding() {
        // Build raw wait statuses the way the kernel encodes them.
        let exited_3 = 3 << 8;
        assert_eq!(decode_wait_status(exited_3), ProcessExitStatus::Exited(3));
        let signaled_9 = 9;
        assert_eq!(
            decode_wait_status(signaled_9),
            ProcessExitStatus::Signaled(9)
        );
    }
}
