//! Worker process spawning, output reading and control.
//!
//! [`ProcessSupervisor::start`] spawns the worker with all three standard
//! streams piped and hands the child to a reader task. The reader task is
//! the only owner of the process. It forwards one classified event per
//! output line, then reaps the process at EOF and emits `Completed`. The
//! supervisor keeps the worker's stdin and a cancellation token, which is
//! how `terminate()` reaches the reader.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Split};
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::process::{EventSender, WorkerCommand};
use crate::protocol::{classify_line, Event};

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The worker executable was not found.
    #[error("Worker binary not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied launching worker: {0}")]
    PermissionDenied(String),
    /// A standard stream was not piped.
    #[error("Worker {0} not available")]
    MissingPipe(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error, program: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(program.display().to_string())
            }
            _ => Self::Io(err),
        }
    }
}

/// Destination for lines typed back into a worker.
#[async_trait]
pub trait WorkerInput: Send {
    /// Write `text` followed by a newline. Returns false if it could not be
    /// delivered.
    async fn write_line(&mut self, text: &str) -> bool;
}

/// Owner of one running worker.
#[derive(Debug)]
pub struct ProcessSupervisor {
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl ProcessSupervisor {
    /// Spawn the worker and start its reader task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn start(command: &WorkerCommand, sender: EventSender) -> Result<Self, SpawnError> {
        Self::start_with_timeout(command, sender, DEFAULT_TERMINATE_TIMEOUT)
    }

    /// Spawn the worker with a custom SIGTERM-to-SIGKILL grace period.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn start_with_timeout(
        command: &WorkerCommand,
        sender: EventSender,
        terminate_timeout: Duration,
    ) -> Result<Self, SpawnError> {
        let mut cmd = command.to_tokio();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(e, command.program()))?;

        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingPipe("stderr"))?;
        let pid = child.id();

        tracing::info!(
            pid = ?pid,
            program = %command.program().display(),
            working_dir = ?command.get_working_dir(),
            "Worker spawned"
        );

        let cancel = CancellationToken::new();
        let reader = ReadLoop {
            child,
            stdout: BufReader::new(stdout).split(b'\n'),
            stderr: BufReader::new(stderr).split(b'\n'),
            sender,
            cancel: cancel.clone(),
            terminate_timeout,
        };

        Ok(Self {
            pid,
            stdin: Some(stdin),
            cancel,
            reader: Some(tokio::spawn(reader.run())),
        })
    }

    /// OS process id captured at spawn time.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Returns true while the reader task has not finished.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.reader.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Returns true once `terminate()` has been called.
    #[must_use]
    pub fn termination_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Forward `text` plus a newline to the worker's stdin.
    ///
    /// Failures are logged and reported through the return value only.
    pub async fn write(&mut self, text: &str) -> bool {
        if !self.is_alive() {
            tracing::warn!(pid = ?self.pid, "Cannot send input, worker is not running");
            return false;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            tracing::warn!(pid = ?self.pid, "Cannot send input, worker stdin is closed");
            return false;
        };

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        let result = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(pid = ?self.pid, error = %e, "Failed to write to worker stdin");
            self.stdin = None;
            return false;
        }
        true
    }

    /// Ask the worker to exit.
    ///
    /// Returns true if this call made the request; later calls are no-ops.
    /// The worker is not guaranteed to have exited when this returns.
    pub fn terminate(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tracing::info!(pid = ?self.pid, "Termination requested");
        self.cancel.cancel();
        true
    }

    /// Wait for the reader task to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader task panicked or was aborted.
    pub async fn wait(&mut self) -> Result<(), tokio::task::JoinError> {
        self.stdin = None;
        match self.reader.take() {
            Some(handle) => handle.await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WorkerInput for ProcessSupervisor {
    async fn write_line(&mut self, text: &str) -> bool {
        self.write(text).await
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.is_alive() {
            self.cancel.cancel();
        }
    }
}

/// State owned by the reader task.
struct ReadLoop<O, E> {
    child: Child,
    stdout: Split<BufReader<O>>,
    stderr: Split<BufReader<E>>,
    sender: EventSender,
    cancel: CancellationToken,
    terminate_timeout: Duration,
}

impl<O, E> ReadLoop<O, E>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    async fn run(mut self) {
        let pid = self.child.id();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut stop_sent = false;
        let mut killed = false;

        let escalation = tokio::time::sleep(self.terminate_timeout);
        tokio::pin!(escalation);

        while stdout_open || stderr_open {
            tokio::select! {
                () = self.cancel.cancelled(), if !stop_sent => {
                    stop_sent = true;
                    request_stop(&mut self.child);
                    escalation.as_mut().reset(Instant::now() + self.terminate_timeout);
                }
                () = &mut escalation, if stop_sent => {
                    if killed {
                        // Something outside the worker still holds the pipes.
                        tracing::warn!(pid = ?pid, "Abandoning worker output after kill");
                        break;
                    }
                    tracing::warn!(pid = ?pid, "Worker ignored termination request, killing");
                    if let Err(e) = self.child.start_kill() {
                        tracing::warn!(pid = ?pid, error = %e, "Failed to kill worker");
                    }
                    killed = true;
                    escalation.as_mut().reset(Instant::now() + self.terminate_timeout);
                }
                segment = self.stdout.next_segment(), if stdout_open => {
                    stdout_open = forward(segment, &self.sender, "stdout");
                }
                segment = self.stderr.next_segment(), if stderr_open => {
                    stderr_open = forward(segment, &self.sender, "stderr");
                }
            }
        }

        let exit_code = match self.child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(pid = ?pid, error = %e, "Failed to reap worker");
                None
            }
        };
        let stopped_by_user = stop_sent || self.cancel.is_cancelled();

        tracing::info!(pid = ?pid, exit_code = ?exit_code, stopped_by_user, "Worker exited");
        self.sender.send(Event::Completed {
            exit_code,
            stopped_by_user,
        });
    }
}

/// Classify one raw output segment and forward it. Returns false at EOF.
fn forward(
    segment: std::io::Result<Option<Vec<u8>>>,
    sender: &EventSender,
    stream: &'static str,
) -> bool {
    match segment {
        Ok(Some(bytes)) => {
            let line = String::from_utf8_lossy(&bytes);
            if let Some(event) = classify_line(&line) {
                sender.send(event);
            }
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(stream, error = %e, "Worker output read failed");
            false
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM not delivered");
        }
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Kill not delivered");
    }
}
