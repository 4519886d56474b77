//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Lines of ffmpeg stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// An ffmpeg invocation: one input, one output, encoder flags in between.
///
/// Always overwrites the output and logs at `warning`, so stderr holds
/// only what is worth reporting.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Append a raw output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    fn flag(self, name: &str, value: impl Into<String>) -> Self {
        self.output_arg(name).output_arg(value)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.flag("-vf", filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.flag("-c:v", codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.flag("-c:a", codec)
    }

    /// x265 constant rate factor.
    pub fn crf(self, crf: u8) -> Self {
        self.flag("-crf", crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.flag("-preset", preset)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.flag("-b:a", bitrate)
    }

    /// Output container.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.flag("-f", format)
    }

    /// Full argument list, without the program name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", "warning", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(self.input.to_string_lossy().into_owned());
        args.extend(self.output_args.iter().cloned());
        args.extend(["-hide_banner".to_string(), "-nostats".to_string()]);
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Program name of ffmpeg, resolved through `PATH`.
pub const FFMPEG: &str = "ffmpeg";
/// Program name of ffprobe, resolved through `PATH`.
pub const FFPROBE: &str = "ffprobe";

/// Runner for FFmpeg commands with an optional timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self {
            program: PathBuf::from(FFMPEG),
            timeout: None,
        }
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `program` instead of the `ffmpeg` on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command.
    ///
    /// On a nonzero exit the error carries the last lines ffmpeg wrote to
    /// stderr. A timed-out process is killed.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let program = check_ffmpeg(&self.program)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;
        let tail_task = tokio::spawn(collect_tail(stderr, STDERR_TAIL_LINES));

        let status = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!("FFmpeg timed out after {:?}, killing process", timeout);
                    let _ = child.kill().await;
                    tail_task.abort();
                    return Err(MediaError::Timeout(timeout.as_secs()));
                }
            },
            None => child.wait().await?,
        };

        let tail = tail_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(tail),
                status.code(),
            ))
        }
    }
}

/// Read stderr to the end, keeping the last `max_lines` lines.
async fn collect_tail(stderr: ChildStderr, max_lines: usize) -> String {
    let mut reader = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(max_lines);

    while let Ok(Some(line)) = reader.next_line().await {
        if tail.len() == max_lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}

/// Resolve `program` (a bare name looked up on `PATH`, or a path) to an
/// executable ffmpeg.
pub fn check_ffmpeg(program: impl AsRef<Path>) -> MediaResult<PathBuf> {
    which::which(program.as_ref()).map_err(|_| MediaError::FfmpegNotFound)
}

/// Same as [`check_ffmpeg`], for ffprobe.
pub fn check_ffprobe(program: impl AsRef<Path>) -> MediaResult<PathBuf> {
    which::which(program.as_ref()).map_err(|_| MediaError::FfprobeNotFound)
}
