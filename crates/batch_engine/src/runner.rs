use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use batch_core::{JobOutcome, LineClass, ProgressParser, WorkItem};
use batch_logging::{batch_debug, batch_error, batch_info, batch_trace, batch_warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::ToolConfig;

/// Stderr lines kept for the failure log message.
const STDERR_TAIL_LINES: usize = 20;

/// Receives per-item percentages while a job runs.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, percent: u8);
}

/// Runs one work item to a terminal outcome.
///
/// Implementations must not fail: every problem, including being unable to
/// start the work at all, resolves to `JobOutcome::Error`. `cancel` fires only
/// when the batch was stopped with `StopPolicy::Immediate`.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_one(
        &self,
        item: &WorkItem,
        output_dir: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobOutcome;
}

/// Runs each item as one invocation of the external download tool.
#[derive(Debug, Clone)]
pub struct ProcessJobRunner {
    config: ToolConfig,
    parser: ProgressParser,
}

impl ProcessJobRunner {
    pub fn new(config: ToolConfig) -> Self {
        let parser = config.parser();
        Self { config, parser }
    }

    fn build_command(&self, item: &WorkItem, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(self.config.command_args(item.identifier(), output_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        configure_for_background(&mut command);
        command
    }
}

#[async_trait::async_trait]
impl JobRunner for ProcessJobRunner {
    async fn run_one(
        &self,
        item: &WorkItem,
        output_dir: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let outcome = self.execute(item, output_dir, sink, cancel).await;
        // The indicator must always reach completion, even if the tool undershot.
        sink.progress(100);
        outcome
    }
}

impl ProcessJobRunner {
    async fn execute(
        &self,
        item: &WorkItem,
        output_dir: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let mut command = self.build_command(item, output_dir);
        batch_info!(
            "Spawning item {} ({}): {:?}",
            item.id(),
            item.title(),
            command.as_std()
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                batch_error!(
                    "Failed to spawn {} for item {}: {}",
                    self.config.program,
                    item.id(),
                    err
                );
                return JobOutcome::Error;
            }
        };

        let stdout = child.stdout.take();
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr(stderr, item.id())));

        let waited = tokio::select! {
            status = stream_until_exit(&mut child, stdout, &self.parser, sink) => Some(status),
            _ = cancel.cancelled() => None,
        };

        let (status, stderr_tail) = match waited {
            Some(status) => {
                let tail = match stderr_task {
                    Some(task) => task.await.unwrap_or_default(),
                    None => VecDeque::new(),
                };
                (status, tail)
            }
            None => {
                // Grandchildren may still hold the pipes open.
                if let Some(task) = stderr_task {
                    task.abort();
                }
                let status = match child.try_wait() {
                    Ok(Some(status)) => {
                        batch_debug!(
                            "Item {} exited before the stop took effect",
                            item.id()
                        );
                        Ok(status)
                    }
                    _ => {
                        batch_warn!("Killing item {} ({}) on stop", item.id(), item.title());
                        if let Err(err) = child.kill().await {
                            batch_error!("Failed to kill item {}: {}", item.id(), err);
                        }
                        Err(io::Error::new(io::ErrorKind::Interrupted, "killed on stop"))
                    }
                };
                (status, VecDeque::new())
            }
        };

        match status {
            Ok(status) if status.success() => {
                batch_info!("Item {} ({}) finished", item.id(), item.title());
                JobOutcome::Finished
            }
            Ok(status) => {
                batch_warn!(
                    "Item {} ({}) failed with {}; stderr tail:\n{}",
                    item.id(),
                    item.title(),
                    status,
                    Vec::from(stderr_tail).join("\n")
                );
                JobOutcome::Error
            }
            Err(err) => {
                batch_warn!("Item {} ({}) did not exit cleanly: {}", item.id(), item.title(), err);
                JobOutcome::Error
            }
        }
    }
}

/// Feeds stdout through the parser line by line, then reaps the child.
async fn stream_until_exit(
    child: &mut Child,
    stdout: Option<ChildStdout>,
    parser: &ProgressParser,
    sink: &dyn ProgressSink,
) -> io::Result<ExitStatus> {
    if let Some(stdout) = stdout {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match read_segment(&mut reader, &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parser.classify(&line) {
                        LineClass::Percent(percent) => sink.progress(percent),
                        LineClass::Unrecognized => batch_trace!("stdout: {}", line.trim_end()),
                        LineClass::Ignored => {}
                    }
                }
                Err(err) => {
                    batch_warn!("Stopped reading tool stdout: {}", err);
                    break;
                }
            }
        }
    }
    child.wait().await
}

/// Reads up to and including the next `\r` or `\n` into `buf`.
///
/// Progress bars are redrawn with bare carriage returns, so each redraw counts
/// as its own line. Returns the number of bytes read; 0 means EOF.
async fn read_segment<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut read = 0;
    loop {
        let (found, used) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(read);
            }
            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(end) => {
                    buf.extend_from_slice(&available[..=end]);
                    (true, end + 1)
                }
                None => {
                    buf.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        reader.consume(used);
        read += used;
        if found {
            return Ok(read);
        }
    }
}

async fn collect_stderr<R>(stderr: R, item_id: usize) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match read_segment(&mut reader, &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                batch_debug!("item {} stderr: {}", item_id, line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
    }
    tail
}

#[cfg(windows)]
fn configure_for_background(command: &mut Command) {
    // Keep console windows from popping up for every item.
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn configure_for_background(_command: &mut Command) {}
