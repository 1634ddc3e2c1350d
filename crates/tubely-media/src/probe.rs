//! FFprobe stream geometry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use tubely_models::OrientationClass;

use crate::command::{check_ffprobe, run_tool};
use crate::error::{MediaError, MediaResult};

/// Pixel geometry of the primary video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimensions {
    /// Coded width in pixels
    pub width: u32,
    /// Coded height in pixels
    pub height: u32,
    /// Display rotation in degrees, normalized to 0..360
    #[serde(default)]
    pub rotation: u32,
}

impl VideoDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rotation: 0,
        }
    }

    /// Width and height as shown to the viewer, after rotation metadata.
    pub fn display_size(&self) -> (u32, u32) {
        if self.rotation == 90 || self.rotation == 270 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    pub fn orientation(&self) -> OrientationClass {
        let (width, height) = self.display_size();
        OrientationClass::classify(width, height)
    }
}

/// Reads stream geometry from a local media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<VideoDimensions>;
}

/// [`MediaProber`] backed by the `ffprobe` executable.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProber {
    timeout: Option<Duration>,
}

impl FfprobeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaResult<VideoDimensions> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        check_ffprobe()?;

        let args = ["-v", "error", "-print_format", "json", "-show_streams"]
            .into_iter()
            .map(OsStr::new)
            .chain(std::iter::once(path.as_os_str()));
        let output = run_tool("ffprobe", args, true, self.timeout).await?;

        if !output.status.success() {
            return Err(MediaError::ffprobe_failed("FFprobe failed", output.stderr_tail));
        }

        let dimensions = parse_ffprobe_output(&output.stdout)?;
        debug!(
            path = %path.display(),
            width = dimensions.width,
            height = dimensions.height,
            rotation = dimensions.rotation,
            "Probed video stream"
        );
        Ok(dimensions)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.parse().ok()))
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360) as u32
    }
}

/// Extract the primary video stream's geometry from `ffprobe -print_format json` output.
///
/// Embedded cover art (`attached_pic`) is not a video stream for this purpose.
pub fn parse_ffprobe_output(stdout: &[u8]) -> MediaResult<VideoDimensions> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video") && s.disposition.attached_pic == 0)
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(VideoDimensions {
            width,
            height,
            rotation: stream.rotation(),
        }),
        _ => Err(MediaError::invalid_video("Video stream has no dimensions")),
    }
}
