//! Fast-start remuxing.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Suffix appended to the input file name to form the remux output.
pub const FAST_START_SUFFIX: &str = ".faststart";

/// Output path for a fast-start remux of `input`, next to the input file.
pub fn fast_start_output_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(FAST_START_SUFFIX);
    PathBuf::from(name)
}

/// Re-containerizes a file so its index precedes the media data.
#[async_trait]
pub trait FastStartRemuxer: Send + Sync {
    /// Returns the path of the newly written file.
    async fn remux(&self, input: &Path) -> MediaResult<PathBuf>;
}

/// [`FastStartRemuxer`] backed by `ffmpeg -c copy -movflags +faststart`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRemuxer {
    timeout: Option<Duration>,
}

impl FfmpegRemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Command used to remux `input`.
    pub fn command(input: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, fast_start_output_path(input))
            .stream_copy()
            .fast_start()
            .format("mp4")
    }
}

#[async_trait]
impl FastStartRemuxer for FfmpegRemuxer {
    async fn remux(&self, input: &Path) -> MediaResult<PathBuf> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let cmd = Self::command(input);
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }

        runner.run(&cmd).await?;

        let output = cmd.output().to_path_buf();
        if !output.exists() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg reported success but wrote no output",
                None,
                None,
            ));
        }

        debug!(input = %input.display(), output = %output.display(), "Remuxed for fast start");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_appends_suffix() {
        let out = fast_start_output_path(Path::new("/tmp/tubely-upload-x/upload.mp4"));
        assert_eq!(out, PathBuf::from("/tmp/tubely-upload-x/upload.mp4.faststart"));
    }

    #[test]
    fn test_output_path_is_deterministic() {
        let input = Path::new("a/b/c.mp4");
        assert_eq!(fast_start_output_path(input), fast_start_output_path(input));
        assert_ne!(fast_start_output_path(input), input);
    }

    #[test]
    fn test_remux_command_is_stream_copy() {
        let args = FfmpegRemuxer::command(Path::new("in.mp4")).build_args();
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert!(!args.iter().any(|a| a == "-c:v" || a == "-crf"));
        assert_eq!(args.last().map(String::as_str), Some("in.mp4.faststart"));
    }

    #[tokio::test]
    async fn test_remux_missing_input() {
        let result = FfmpegRemuxer::new()
            .remux(Path::new("/nonexistent/upload.mp4"))
            .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
