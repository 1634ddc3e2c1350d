//! FFmpeg CLI wrapper for upload processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Timeout and cancellation support via tokio
//! - Stream geometry probing (`MediaProber`)
//! - Fast-start remuxing without re-encoding (`FastStartRemuxer`)

pub mod command;
pub mod error;
pub mod probe;
pub mod remux;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{parse_ffprobe_output, FfprobeProber, MediaProber, VideoDimensions};
pub use remux::{fast_start_output_path, FastStartRemuxer, FfmpegRemuxer};
