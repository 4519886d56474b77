//! FFmpeg CLI wrapper and HEVC re-encoding pipeline.
//!
//! This crate provides:
//! - FFmpeg command building and execution with timeouts
//! - Media probing via ffprobe
//! - Cross-device safe file moves
//! - The scan / reencode / cleanup pipeline run by workers

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod pipeline;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{bytes_to_mib, move_file};
pub use pipeline::{
    EncodePlan, EncodeSettings, EncodingPipeline, FfmpegPipeline, ScanOutcome, SizeReport,
};
pub use probe::{probe_media, MediaInfo};
