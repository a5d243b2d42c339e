//! The output pipe: one writer, one ordered shutdown.

use std::io::ErrorKind;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tokio::process::{Child, ChildStdin, Command};

use histweave_common::error::{HistweaveError, HistweaveResult};
use histweave_model::options::SinkConfig;

use crate::process::{CommandSpec, ProcessPlan, SinkKind};

/// Lifecycle of an output pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    /// Opened, nothing written yet.
    Idle,
    /// At least one line written.
    Streaming,
    /// Input closed (or downstream gone); waiting for the sink to settle.
    Draining,
    /// Finished.
    Closed,
}

/// Outcome of a finished pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeSummary {
    /// Lines accepted by the sink.
    pub lines_written: u64,

    /// The consumer went away before the stream ended.
    pub downstream_closed: bool,
}

enum Sink {
    Stdout(BufWriter<Stdout>),
    File(BufWriter<File>),
    Process {
        stdin: Option<ChildStdin>,
        renderer: Child,
        encoder: Option<Child>,
    },
}

/// Delivers newline-terminated event lines to a sink.
///
/// Writes wait for the sink to accept the bytes, so a slow consumer slows
/// the producer instead of growing memory. [`OutputPipe::finish`] closes the
/// input and waits for any subprocesses; it consumes the pipe, so it runs at
/// most once. Subprocesses are killed if the pipe is dropped unfinished.
pub struct OutputPipe {
    sink: Sink,
    state: PipeState,
    lines_written: u64,
    downstream_closed: bool,
}

impl OutputPipe {
    /// Open the sink selected by `config`.
    pub async fn open(config: &SinkConfig) -> HistweaveResult<Self> {
        tracing::debug!(kind = ?SinkKind::for_config(config), "Opening output sink");
        match ProcessPlan::from_config(config) {
            Some(plan) => Self::spawn(&plan),
            None => match &config.output {
                Some(path) => Self::to_file(path).await,
                None => Ok(Self::stdout()),
            },
        }
    }

    /// Plain text on standard output.
    pub fn stdout() -> Self {
        Self::with_sink(Sink::Stdout(BufWriter::new(tokio::io::stdout())))
    }

    /// Plain text in a file, truncating it and creating parent directories.
    pub async fn to_file(path: &Path) -> HistweaveResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(path).await.map_err(|e| {
            HistweaveError::sink(format!("Failed to create {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "Writing events to file");
        Ok(Self::with_sink(Sink::File(BufWriter::new(file))))
    }

    /// Spawn the renderer, and the encoder behind it when the plan has one.
    pub fn spawn(plan: &ProcessPlan) -> HistweaveResult<Self> {
        let chained = plan.encoder.is_some();

        let mut renderer = command_for(&plan.renderer)
            .stdin(Stdio::piped())
            .stdout(if chained {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .spawn()
            .map_err(|e| spawn_error(&plan.renderer, e))?;

        tracing::debug!(
            pid = renderer.id(),
            args = ?plan.renderer.args,
            "Renderer process started"
        );

        let encoder = match &plan.encoder {
            Some(spec) => {
                let frames: Stdio = renderer
                    .stdout
                    .take()
                    .ok_or_else(|| HistweaveError::sink("Failed to capture renderer stdout"))?
                    .try_into()?;
                let encoder = command_for(spec)
                    .stdin(frames)
                    .stdout(Stdio::inherit())
                    .spawn()
                    .map_err(|e| spawn_error(spec, e))?;
                tracing::debug!(pid = encoder.id(), args = ?spec.args, "Encoder process started");
                Some(encoder)
            }
            None => None,
        };

        let stdin = renderer.stdin.take();
        if stdin.is_none() {
            return Err(HistweaveError::sink("Failed to capture renderer stdin"));
        }

        Ok(Self::with_sink(Sink::Process {
            stdin,
            renderer,
            encoder,
        }))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            sink,
            state: PipeState::Idle,
            lines_written: 0,
            downstream_closed: false,
        }
    }

    pub fn state(&self) -> PipeState {
        self.state
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Write one line; the newline is appended here.
    ///
    /// Once the consumer has closed its end, further lines are discarded.
    pub async fn write_line(&mut self, line: &str) -> HistweaveResult<()> {
        match self.state {
            PipeState::Closed => return Err(HistweaveError::sink("Write after close")),
            PipeState::Draining => return Ok(()),
            PipeState::Idle => self.state = PipeState::Streaming,
            PipeState::Streaming => {}
        }

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let result = match &mut self.sink {
            Sink::Stdout(w) => w.write_all(buf.as_bytes()).await,
            Sink::File(w) => w.write_all(buf.as_bytes()).await,
            Sink::Process { stdin, .. } => match stdin {
                Some(stdin) => stdin.write_all(buf.as_bytes()).await,
                None => Err(ErrorKind::BrokenPipe.into()),
            },
        };

        match result {
            Ok(()) => {
                self.lines_written += 1;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!(
                    lines_written = self.lines_written,
                    "Consumer closed the stream; discarding remaining events"
                );
                self.downstream_closed = true;
                self.state = PipeState::Draining;
                Ok(())
            }
            Err(e) => Err(HistweaveError::sink(format!("Failed to write event: {e}"))),
        }
    }

    /// Close the input, then wait for the sink to finish.
    pub async fn finish(mut self) -> HistweaveResult<PipeSummary> {
        self.state = PipeState::Draining;

        match &mut self.sink {
            Sink::Stdout(w) => {
                let flushed = w.flush().await;
                self.absorb_broken_pipe(flushed)?;
            }
            Sink::File(w) => {
                w.flush().await?;
                w.shutdown().await?;
            }
            Sink::Process {
                stdin,
                renderer,
                encoder,
            } => {
                // EOF must reach the renderer before waiting on it.
                if let Some(mut input) = stdin.take() {
                    let closed = close_writer(&mut input).await;
                    drop(input);
                    if let Err(e) = closed {
                        if e.kind() != ErrorKind::BrokenPipe {
                            return Err(HistweaveError::sink(format!(
                                "Failed to close renderer input: {e}"
                            )));
                        }
                        self.downstream_closed = true;
                    }
                }

                let status = renderer.wait().await.map_err(|e| {
                    HistweaveError::sink(format!("Failed to wait on renderer: {e}"))
                })?;
                tracing::debug!(%status, "Renderer exited");

                let encoder_status = match encoder {
                    Some(encoder) => Some(encoder.wait().await.map_err(|e| {
                        HistweaveError::sink(format!("Failed to wait on encoder: {e}"))
                    })?),
                    None => None,
                };

                check_exit("renderer", status, self.downstream_closed)?;
                if let Some(status) = encoder_status {
                    tracing::debug!(%status, "Encoder exited");
                    check_exit("encoder", status, false)?;
                }
            }
        }

        self.state = PipeState::Closed;
        tracing::debug!(lines_written = self.lines_written, "Output pipe closed");

        Ok(PipeSummary {
            lines_written: self.lines_written,
            downstream_closed: self.downstream_closed,
        })
    }

    fn absorb_broken_pipe(&mut self, result: std::io::Result<()>) -> HistweaveResult<()> {
        match result {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                self.downstream_closed = true;
                Ok(())
            }
            other => other.map_err(|e| HistweaveError::sink(format!("Failed to flush: {e}"))),
        }
    }
}

fn command_for(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    cmd
}

fn spawn_error(spec: &CommandSpec, e: std::io::Error) -> HistweaveError {
    HistweaveError::sink(format!(
        "Failed to start {}: {e}",
        spec.program.display()
    ))
}

async fn close_writer<W: AsyncWrite + Unpin>(writer: &mut W) -> std::io::Result<()> {
    writer.flush().await?;
    writer.shutdown().await
}

fn check_exit(name: &str, status: ExitStatus, downstream_closed: bool) -> HistweaveResult<()> {
    if status.success() {
        return Ok(());
    }
    if downstream_closed {
        tracing::warn!(%status, "{name} exited early");
        return Ok(());
    }
    Err(HistweaveError::sink(format!("{name} exited with {status}")))
}
