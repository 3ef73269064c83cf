//! Subprocess lifecycle for conversion jobs.
//!
//! `start()` returns as soon as the process is spawned and registered. From
//! then on a background task per job owns the [`Child`]: it forwards every
//! output chunk as a `progress` event, signals the process when a stop is
//! requested, and after exit publishes exactly one terminal event.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use ffbuilder_core::error::CoreError;
use ffbuilder_core::ffmpeg::{self, FfmpegConfig, Invocation};
use ffbuilder_core::job::{JobKind, JobState};
use ffbuilder_core::params::JobRequest;
use ffbuilder_core::types::{new_job_id, JobId};
use ffbuilder_events::{EventBroadcaster, JobEvent};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::{JobHandle, JobRegistry, JobSummary};

/// Read buffer size for each output stream.
const READ_BUF_SIZE: usize = 8 * 1024;

/// Chunks buffered between the stream readers and the job task.
const CHUNK_CHANNEL_CAPACITY: usize = 256;

/// Diagnostic output kept for the failure event (tail).
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// How long buffered output is still forwarded once the process has exited.
/// Descendants that inherited the pipes can keep them open indefinitely.
const POST_EXIT_DRAIN: Duration = Duration::from_millis(500);

/// Spawn attempts while the executable is still open for writing (ETXTBSY).
const SPAWN_BUSY_ATTEMPTS: u32 = 5;
const SPAWN_BUSY_BACKOFF: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

/// Starts, stops, and lists conversion jobs.
///
/// Cheap to share behind `Arc`; the registry and broadcaster are the same
/// instances the HTTP layer holds.
pub struct JobRunner {
    ffmpeg: FfmpegConfig,
    registry: Arc<JobRegistry>,
    broadcaster: Arc<EventBroadcaster>,
}

impl JobRunner {
    pub fn new(
        ffmpeg: FfmpegConfig,
        registry: Arc<JobRegistry>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            ffmpeg,
            registry,
            broadcaster,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Validate `request`, build its invocation, and launch it.
    ///
    /// Returns the new job id without waiting for the process to finish.
    pub async fn start(&self, request: JobRequest) -> Result<JobId, CoreError> {
        let kind = request.kind();
        let prepared = ffmpeg::build(&request, &self.ffmpeg).await?;
        tracing::debug!(
            kind = %kind,
            output_dir = %prepared.output_dir.display(),
            "Prepared conversion command",
        );
        self.launch(kind, prepared.invocation).await
    }

    /// Spawn a prebuilt invocation and track it as a job of `kind`.
    ///
    /// On spawn failure an `error` event is published for the would-be id,
    /// the job is never registered, and [`CoreError::Spawn`] is returned.
    pub async fn launch(&self, kind: JobKind, invocation: Invocation) -> Result<JobId, CoreError> {
        let job_id = new_job_id();

        tracing::info!(
            job_id = %job_id,
            kind = %kind,
            command = %invocation.command_line(),
            "Starting {} conversion",
            kind.label(),
        );

        let mut command = Command::new(invocation.program());
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match spawn_command(&mut command).await {
            Ok(child) => child,
            Err(source) => {
                tracing::error!(
                    job_id = %job_id,
                    kind = %kind,
                    error = %source,
                    "{} conversion error",
                    kind.label(),
                );
                self.broadcaster
                    .publish(JobEvent::spawn_failed(job_id, kind, &source.to_string()))
                    .await;
                return Err(CoreError::Spawn {
                    program: invocation.program().to_string(),
                    source,
                });
            }
        };

        let stop = CancellationToken::new();
        let pid = child.id();
        self.registry
            .insert(job_id, JobHandle::new(kind, pid, stop.clone()))
            .await?;

        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_stream(
                stdout,
                OutputStream::Stdout,
                chunk_tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_stream(
                stderr,
                OutputStream::Stderr,
                chunk_tx.clone(),
            )));
        }
        drop(chunk_tx);

        let job = RunningJob {
            job_id,
            kind,
            registry: Arc::clone(&self.registry),
            broadcaster: Arc::clone(&self.broadcaster),
        };
        tokio::spawn(job.supervise(child, chunk_rx, readers, stop));

        tracing::debug!(job_id = %job_id, pid = ?pid, "Job registered");
        Ok(job_id)
    }

    /// Request termination of a running job.
    ///
    /// Removes the job from the registry and signals its task; does not
    /// wait for the process to exit. Unknown or already finished ids yield
    /// [`CoreError::NotFound`].
    pub async fn stop(&self, job_id: JobId) -> Result<(), CoreError> {
        match self.registry.remove(&job_id).await {
            Some(handle) => {
                handle.request_stop();
                tracing::info!(job_id = %job_id, pid = ?handle.pid, "Process stopped");
                Ok(())
            }
            None => Err(CoreError::NotFound {
                entity: "Job",
                id: job_id.to_string(),
            }),
        }
    }

    /// Ids of all running jobs, oldest first.
    pub async fn list(&self) -> Vec<JobId> {
        self.registry.ids().await
    }

    pub async fn summaries(&self) -> Vec<JobSummary> {
        self.registry.summaries().await
    }

    /// Stop every running job. Returns how many were signalled.
    pub async fn stop_all(&self) -> usize {
        let drained = self.registry.drain().await;
        for (job_id, handle) in &drained {
            handle.request_stop();
            tracing::info!(job_id = %job_id, "Process stopped during shutdown");
        }
        drained.len()
    }
}

// ---------------------------------------------------------------------------
// Per-job task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputStream {
    Stdout,
    Stderr,
}

struct OutputChunk {
    stream: OutputStream,
    bytes: Vec<u8>,
}

struct RunningJob {
    job_id: JobId,
    kind: JobKind,
    registry: Arc<JobRegistry>,
    broadcaster: Arc<EventBroadcaster>,
}

impl RunningJob {
    /// Own the child until it exits, then publish the terminal event.
    async fn supervise(
        self,
        mut child: Child,
        mut chunks: mpsc::Receiver<OutputChunk>,
        readers: Vec<JoinHandle<()>>,
        stop: CancellationToken,
    ) {
        let mut stderr_tail = OutputTail::new(MAX_STDERR_BYTES);
        let mut streams_open = true;
        let mut stop_requested = false;

        let status = loop {
            let mut signal_now = false;

            tokio::select! {
                chunk = chunks.recv(), if streams_open => match chunk {
                    Some(chunk) => self.forward(chunk, &mut stderr_tail).await,
                    None => streams_open = false,
                },
                () = stop.cancelled(), if !stop_requested => {
                    stop_requested = true;
                    signal_now = true;
                }
                status = child.wait() => break status,
            }

            if signal_now {
                terminate(&mut child, self.job_id);
            }
        };

        self.registry.remove(&self.job_id).await;

        // Output still buffered after exit must precede the terminal event.
        let drained = tokio::time::timeout(POST_EXIT_DRAIN, async {
            while let Some(chunk) = chunks.recv().await {
                self.forward(chunk, &mut stderr_tail).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::debug!(
                job_id = %self.job_id,
                "Output pipes still open after exit, detaching readers",
            );
        }
        drop(chunks);
        for reader in readers {
            reader.abort();
        }

        let event = self.terminal_event(status, stop_requested, stderr_tail.into_string());
        self.broadcaster.publish(event).await;
    }

    async fn forward(&self, chunk: OutputChunk, stderr_tail: &mut OutputTail) {
        if chunk.stream == OutputStream::Stderr {
            stderr_tail.push(&chunk.bytes);
        }
        let text = String::from_utf8_lossy(&chunk.bytes).into_owned();
        self.broadcaster
            .publish(JobEvent::progress(self.job_id, self.kind, text))
            .await;
    }

    fn terminal_event(
        &self,
        status: std::io::Result<ExitStatus>,
        stop_requested: bool,
        stderr: String,
    ) -> JobEvent {
        let label = self.kind.label();
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Failed to wait for process");
                return JobEvent::failed(self.job_id, self.kind, None, e.to_string());
            }
        };

        match JobState::from_exit(status.success(), stop_requested) {
            JobState::Completed => {
                tracing::info!(job_id = %self.job_id, "{label} conversion completed successfully");
                JobEvent::completed(self.job_id, self.kind)
            }
            JobState::Stopped => {
                tracing::info!(
                    job_id = %self.job_id,
                    code = ?status.code(),
                    "{label} conversion stopped",
                );
                JobEvent::stopped(self.job_id, self.kind)
            }
            _ => {
                let code = status.code();
                let failure = CoreError::RuntimeFailure {
                    code,
                    stderr: stderr.clone(),
                };
                tracing::error!(
                    job_id = %self.job_id,
                    code = ?code,
                    error = %failure,
                    "{label} conversion failed",
                );
                JobEvent::failed(self.job_id, self.kind, code, stderr)
            }
        }
    }
}

/// Spawn `command`, retrying briefly while the executable is busy.
///
/// A script that was just written can still be open for writing in a
/// process forked concurrently, and exec then fails with ETXTBSY.
async fn spawn_command(command: &mut Command) -> std::io::Result<Child> {
    let mut attempt = 1;
    loop {
        match command.spawn() {
            Err(e) if is_text_busy(&e) && attempt < SPAWN_BUSY_ATTEMPTS => {
                tracing::debug!(attempt, error = %e, "Executable busy, retrying spawn");
                tokio::time::sleep(SPAWN_BUSY_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn is_text_busy(error: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        error.raw_os_error() == Some(libc::ETXTBSY)
    }
    #[cfg(not(unix))]
    {
        let _ = error;
        false
    }
}

/// Send a termination request to the child.
///
/// SIGTERM on Unix so the tool can finalize its output; a hard kill
/// elsewhere.
fn terminate(child: &mut Child, job_id: JobId) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: `kill` has no memory-safety preconditions, and the pid
            // belongs to a child this task has not reaped yet.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                tracing::warn!(
                    job_id = %job_id,
                    pid,
                    error = %std::io::Error::last_os_error(),
                    "Failed to send SIGTERM",
                );
            }
            return;
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::warn!(job_id = %job_id, error = %e, "Failed to kill process");
    }
}

/// Read one output stream in raw chunks until EOF.
async fn forward_stream<R>(mut reader: R, stream: OutputStream, tx: mpsc::Sender<OutputChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = OutputChunk {
                    stream,
                    bytes: buf[..n].to_vec(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(stream = ?stream, error = %e, "Failed to read process output");
                break;
            }
        }
    }
}

/// Bounded buffer keeping the most recent bytes of a stream.
struct OutputTail {
    buf: Vec<u8>,
    max: usize,
}

impl OutputTail {
    fn new(max: usize) -> Self {
        Self {
            buf: Vec::new(),
            max,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.max {
            let excess = self.buf.len() - self.max;
            self.buf.drain(..excess);
        }
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
