//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Copy every stream without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_args(["-map", "0", "-c", "copy"])
    }

    /// Move the `moov` atom to the front of the file.
    pub fn fast_start(self) -> Self {
        self.output_args(["-movflags", "+faststart"])
    }

    /// Force the output container format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());
        args.push("-nostdin".to_string());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with an optional deadline.
///
/// Dropping the future returned by [`FfmpegRunner::run`] also terminates the
/// process.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let timeout = self.timeout_secs.map(Duration::from_secs);
        let output = run_tool("ffmpeg", &args, false, timeout).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                output.stderr_tail,
                output.status.code(),
            ))
        }
    }
}

/// A finished external tool.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub status: ExitStatus,
    /// Empty unless stdout was captured
    pub stdout: Vec<u8>,
    pub stderr_tail: Option<String>,
}

/// Run `program` to completion, killing it once `timeout` passes.
///
/// The child is spawned with `kill_on_drop`, so dropping the returned future
/// also terminates the process. Only the last [`STDERR_TAIL_LINES`] lines of
/// stderr are kept.
pub(crate) async fn run_tool<I, S>(
    program: &str,
    args: I,
    capture_stdout: bool,
    timeout: Option<Duration>,
) -> MediaResult<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(if capture_stdout { Stdio::piped() } else { Stdio::null() })
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr not captured"))?;

    // Keep only the tail so a chatty process cannot grow memory unbounded
    let stderr_handle = tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        while let Ok(Some(line)) = reader.next_line().await {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        Vec::from(tail).join("\n")
    });
    let stdout_handle = child.stdout.take().map(|mut stdout| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        })
    });

    let status = wait_with_deadline(program, &mut child, timeout).await;
    let stderr_tail = stderr_handle.await.unwrap_or_default();
    let status = status?;

    let stdout = match stdout_handle {
        Some(handle) => handle.await.map_err(io::Error::other)??,
        None => Vec::new(),
    };

    Ok(ToolOutput {
        status,
        stdout,
        stderr_tail: (!stderr_tail.is_empty()).then_some(stderr_tail),
    })
}

/// Wait for the child, killing it once the deadline passes.
async fn wait_with_deadline(
    program: &str,
    child: &mut Child,
    timeout: Option<Duration>,
) -> MediaResult<ExitStatus> {
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        status = child.wait() => Ok(status?),
        _ = deadline => {
            let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
            warn!("{} timed out after {} seconds, killing process", program, secs);
            let _ = child.kill().await;
            Err(MediaError::Timeout(secs))
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .stream_copy()
            .fast_start()
            .format("mp4");

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert!(args.windows(2).any(|w| w == ["-f", "mp4"]));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_input_precedes_output_args() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4")
            .input_args(["-hide_banner"])
            .stream_copy();
        let args = cmd.build_args();

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let banner_pos = args.iter().position(|a| a == "-hide_banner").unwrap();
        let copy_pos = args.iter().position(|a| a == "copy").unwrap();
        assert!(banner_pos < input_pos);
        assert!(copy_pos > input_pos);
        assert_eq!(args[input_pos + 1], "in.mp4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_captures_output() {
        let output = run_tool("sh", ["-c", "echo out; echo err >&2; exit 3"], true, None)
            .await
            .unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr_tail.as_deref(), Some("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_keeps_stderr_tail() {
        let script = "for i in $(seq 1 50); do echo line$i >&2; done";
        let output = run_tool("sh", ["-c", script], false, None).await.unwrap();

        let tail = output.stderr_tail.unwrap();
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert_eq!(tail.lines().last(), Some("line50"));
        assert!(output.stdout.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_kills_on_deadline() {
        let started = std::time::Instant::now();
        let err = run_tool("sleep", ["5"], true, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Timeout(0)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
