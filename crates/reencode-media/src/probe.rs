//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What ffprobe reports about a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container format name(s), e.g. `matroska,webm`
    pub format_name: String,
    /// Codec of the first real video stream
    pub video_codec: Option<String>,
    /// Width of the first real video stream in pixels
    pub width: Option<u32>,
    /// Height of the first real video stream in pixels
    pub height: Option<u32>,
    /// Container bitrate in bits/second
    pub bitrate: Option<u64>,
    /// File size in bytes
    pub size: u64,
}

impl MediaInfo {
    /// Whether the file carries a video stream (cover art does not count).
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    /// Whether the container is a still-image format.
    pub fn is_image(&self) -> bool {
        self.format_name == "image2" || self.format_name.ends_with("_pipe")
    }

    /// Whether the video stream is already HEVC.
    pub fn is_hevc(&self) -> bool {
        matches!(self.video_codec.as_deref(), Some("hevc") | Some("h265"))
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    format_name: String,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

/// Probe a media file with the ffprobe at `ffprobe`.
pub async fn probe_media(
    ffprobe: impl AsRef<Path>,
    path: impl AsRef<Path>,
) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let program = check_ffprobe(ffprobe)?;

    let output = Command::new(&program)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Turn ffprobe's JSON into [`MediaInfo`].
fn parse_probe_output(json: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video") && s.disposition.attached_pic == 0);

    Ok(MediaInfo {
        format_name: probe.format.format_name,
        video_codec: video.and_then(|s| s.codec_name.clone()),
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        bitrate: probe.format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
        size: probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
    })
}
