//! HEVC re-encoding pipeline.
//!
//! A job runs in three steps so the worker can report between them:
//! `scan` decides whether the file needs work, `reencode` writes an HEVC
//! copy into a private temp dir, `cleanup` swaps it in beside the source.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner, FFMPEG, FFPROBE};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{bytes_to_mib, move_file};
use crate::probe::{probe_media, MediaInfo};

/// Extra bitrate an HEVC file may carry over the target and still be left alone.
pub const BITRATE_HEADROOM: u64 = 500_000;

/// Extensions that are never video and are skipped without probing.
pub const IGNORED_EXTENSIONS: &[&str] = &[
    "nfo", "sub", "idx", "txt", "srt", "ass", "ssa", "vtt", "jpg", "jpeg", "png", "gif", "bmp",
    "webp", "nzb", "sfv", "par2", "md5", "xml", "json",
];

/// Extension of every re-encoded file.
const OUTPUT_EXTENSION: &str = "mp4";

/// Encoder settings.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    /// Bitrate (bits/second) under which an HEVC file counts as processed
    pub target_bitrate: u64,
    /// Wider videos are scaled down to this width
    pub max_width: u32,
    /// x265 constant rate factor
    pub crf: u8,
    /// x265 preset
    pub preset: String,
    /// AAC bitrate
    pub audio_bitrate: String,
    /// Kill ffmpeg after this long (None = no limit)
    pub timeout: Option<Duration>,
    /// Parent of per-job temp dirs (None = system temp dir)
    pub work_dir: Option<PathBuf>,
    /// ffmpeg binary, a name on `PATH` or a path
    pub ffmpeg: PathBuf,
    /// ffprobe binary, a name on `PATH` or a path
    pub ffprobe: PathBuf,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            target_bitrate: 2_000_000,
            max_width: 1280,
            crf: 28,
            preset: "medium".to_string(),
            audio_bitrate: "128k".to_string(),
            timeout: None,
            work_dir: None,
            ffmpeg: PathBuf::from(FFMPEG),
            ffprobe: PathBuf::from(FFPROBE),
        }
    }
}

impl EncodeSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_bitrate: std::env::var("ENCODE_TARGET_BITRATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.target_bitrate),
            max_width: std::env::var("ENCODE_MAX_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_width),
            timeout: std::env::var("ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            work_dir: std::env::var("WORKER_WORK_DIR").ok().map(PathBuf::from),
            ffmpeg: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg.clone()),
            ffprobe: std::env::var("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe.clone()),
            ..defaults
        }
    }

    /// Whether a probed file needs no work. Returns the reason if so.
    pub fn skip_reason(&self, info: &MediaInfo) -> Option<String> {
        if info.is_image() {
            return Some(format!("image container {}", info.format_name));
        }
        if !info.has_video() {
            return Some("no video stream".to_string());
        }
        if info.is_hevc() {
            // Unknown bitrate on an HEVC file is treated as already processed
            let bitrate = info.bitrate.unwrap_or(0);
            if bitrate < self.target_bitrate + BITRATE_HEADROOM {
                return Some(format!("already HEVC at {} bit/s", bitrate));
            }
        }
        None
    }

    /// Scale filter for a probed file, if it is too wide.
    pub fn scale_filter(&self, info: &MediaInfo) -> Option<String> {
        match info.width {
            Some(width) if width > self.max_width => Some(format!("scale={}:-2", self.max_width)),
            _ => None,
        }
    }
}

/// Result of the scan step.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Nothing to do; the reason is for logs
    NotApplicable(String),
    /// Work to do
    Plan(EncodePlan),
}

/// Everything the reencode and cleanup steps need for one file.
///
/// Owns the temp dir; it is removed when the plan is dropped.
#[derive(Debug)]
pub struct EncodePlan {
    source: PathBuf,
    work: TempDir,
    output: PathBuf,
    scale_filter: Option<String>,
}

impl EncodePlan {
    /// Create a plan for `source`, writing into a new temp dir under `work_dir`.
    pub fn new(
        source: impl Into<PathBuf>,
        work_dir: Option<&Path>,
        scale_filter: Option<String>,
    ) -> MediaResult<Self> {
        let source = source.into();
        let stem = source
            .file_stem()
            .ok_or_else(|| MediaError::InvalidVideo(format!("no file name in {}", source.display())))?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("reencode-");
        let work = match work_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };

        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(OUTPUT_EXTENSION);
        let output = work.path().join(file_name);

        Ok(Self {
            source,
            work,
            output,
            scale_filter,
        })
    }

    /// File being re-encoded.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Temp output written by the reencode step.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Final location: the source's directory, `.mp4` extension.
    pub fn destination(&self) -> PathBuf {
        self.source.with_extension(OUTPUT_EXTENSION)
    }

    /// Scale filter applied while encoding.
    pub fn scale_filter(&self) -> Option<&str> {
        self.scale_filter.as_deref()
    }

    /// ffmpeg invocation for this plan.
    pub fn command(&self, settings: &EncodeSettings) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(&self.source, &self.output)
            .video_codec("libx265")
            .preset(settings.preset.clone())
            .crf(settings.crf);
        let cmd = match &self.scale_filter {
            Some(filter) => cmd.video_filter(filter.clone()),
            None => cmd,
        };
        cmd.audio_codec("aac")
            .audio_bitrate(settings.audio_bitrate.clone())
            .format(OUTPUT_EXTENSION)
    }

    /// Replace the source with the encoded output.
    ///
    /// Sizes are measured before anything moves. The source is removed only
    /// when it is not the destination itself.
    pub async fn finish(self) -> MediaResult<SizeReport> {
        let original_bytes = tokio::fs::metadata(&self.source).await?.len();
        let new_bytes = tokio::fs::metadata(&self.output).await?.len();

        let destination = self.destination();
        let replaces_source = same_file(&self.source, &destination).await;
        move_file(&self.output, &destination).await?;

        if !replaces_source {
            tokio::fs::remove_file(&self.source).await?;
        }

        debug!(work_dir = %self.work.path().display(), "Removing work dir");
        drop(self.work);

        Ok(SizeReport {
            original_mib: bytes_to_mib(original_bytes),
            new_mib: bytes_to_mib(new_bytes),
            destination,
        })
    }
}

/// Whether `destination` already names `source` (case folding, links).
/// A missing destination never does.
async fn same_file(source: &Path, destination: &Path) -> bool {
    let (Ok(source), Ok(destination)) = (
        tokio::fs::canonicalize(source).await,
        tokio::fs::canonicalize(destination).await,
    ) else {
        return false;
    };
    source == destination || same_inode(&source, &destination).await
}

#[cfg(unix)]
async fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (tokio::fs::metadata(a).await, tokio::fs::metadata(b).await) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
async fn same_inode(_a: &Path, _b: &Path) -> bool {
    false
}

/// Sizes before and after, in whole MiB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeReport {
    pub original_mib: u64,
    pub new_mib: u64,
    pub destination: PathBuf,
}

/// The three pipeline steps a worker drives.
#[async_trait]
pub trait EncodingPipeline: Send + Sync {
    /// Decide whether `file` needs re-encoding.
    async fn scan(&self, file: &Path) -> MediaResult<ScanOutcome>;

    /// Write the re-encoded copy.
    async fn reencode(&self, plan: &EncodePlan) -> MediaResult<()>;

    /// Swap the copy in for the source.
    async fn cleanup(&self, plan: EncodePlan) -> MediaResult<SizeReport>;
}

/// Pipeline backed by the ffmpeg and ffprobe CLIs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegPipeline {
    settings: EncodeSettings,
}

impl FfmpegPipeline {
    pub fn new(settings: EncodeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }
}

/// Whether `path` has an extension that is never video.
pub fn has_ignored_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            IGNORED_EXTENSIONS
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[async_trait]
impl EncodingPipeline for FfmpegPipeline {
    async fn scan(&self, file: &Path) -> MediaResult<ScanOutcome> {
        if has_ignored_extension(file) {
            return Ok(ScanOutcome::NotApplicable(format!(
                "ignored extension: {}",
                file.display()
            )));
        }

        let info = probe_media(&self.settings.ffprobe, file).await?;
        debug!(file = %file.display(), ?info, "Probed file");

        if let Some(reason) = self.settings.skip_reason(&info) {
            return Ok(ScanOutcome::NotApplicable(reason));
        }

        let plan = EncodePlan::new(
            file,
            self.settings.work_dir.as_deref(),
            self.settings.scale_filter(&info),
        )?;
        Ok(ScanOutcome::Plan(plan))
    }

    async fn reencode(&self, plan: &EncodePlan) -> MediaResult<()> {
        let mut runner = FfmpegRunner::new().with_program(&self.settings.ffmpeg);
        if let Some(timeout) = self.settings.timeout {
            runner = runner.with_timeout(timeout);
        }

        let start = Instant::now();
        runner.run(&plan.command(&self.settings)).await?;
        info!(
            file = %plan.source().display(),
            elapsed_secs = start.elapsed().as_secs(),
            "Re-encode finished"
        );
        Ok(())
    }

    async fn cleanup(&self, plan: EncodePlan) -> MediaResult<SizeReport> {
        plan.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(codec: &str, width: u32, bitrate: Option<u64>) -> MediaInfo {
        MediaInfo {
            format_name: "matroska,webm".to_string(),
            video_codec: Some(codec.to_string()),
            width: Some(width),
            height: Some(width * 9 / 16),
            bitrate,
            size: 0,
        }
    }

    #[test]
    fn test_skip_reason() {
        let settings = EncodeSettings::default();

        assert!(settings.skip_reason(&info("hevc", 1280, Some(2_400_000))).is_some());
        assert!(settings.skip_reason(&info("hevc", 1280, None)).is_some());
        assert!(settings.skip_reason(&info("hevc", 1280, Some(2_500_000))).is_none());
        assert!(settings.skip_reason(&info("h264", 1280, Some(1_000_000))).is_none());
        assert!(settings.skip_reason(&MediaInfo::default()).is_some());
    }

    #[test]
    fn test_scale_filter() {
        let settings = EncodeSettings::default();
        assert_eq!(
            settings.scale_filter(&info("h264", 1920, None)).as_deref(),
            Some("scale=1280:-2")
        );
        assert_eq!(settings.scale_filter(&info("h264", 1280, None)), None);
    }

    #[test]
    fn test_ignored_extensions() {
        assert!(has_ignored_extension(Path::new("/v/movie.nfo")));
        assert!(has_ignored_extension(Path::new("/v/movie.IDX")));
        assert!(!has_ignored_extension(Path::new("/v/movie.mkv")));
        assert!(!has_ignored_extension(Path::new("/v/movie")));
    }

    #[tokio::test]
    async fn test_scan_skips_ignored_extension_without_probing() {
        let pipeline = FfmpegPipeline::default();
        let outcome = pipeline.scan(Path::new("/nowhere/movie.nfo")).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::NotApplicable(_)));
    }

    #[test]
    fn test_plan_command() {
        let work = tempfile::tempdir().unwrap();
        let plan = EncodePlan::new(
            "/videos/show/s01.ep1.mkv",
            Some(work.path()),
            Some("scale=1280:-2".to_string()),
        )
        .unwrap();

        assert_eq!(plan.destination(), PathBuf::from("/videos/show/s01.ep1.mp4"));
        assert_eq!(plan.output().file_name().unwrap(), "s01.ep1.mp4");
        assert!(plan.output().starts_with(work.path()));

        let args = plan.command(&EncodeSettings::default()).build_args().join(" ");
        assert!(args.contains("-i /videos/show/s01.ep1.mkv"));
        assert!(args.contains("-c:v libx265 -preset medium -crf 28 -vf scale=1280:-2"));
        assert!(args.contains("-c:a aac -b:a 128k -f mp4"));
    }

    #[tokio::test]
    async fn test_finish_replaces_source() {
        let library = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let source = library.path().join("ep1.mkv");
        std::fs::write(&source, vec![0u8; 3 * 1024 * 1024 + 10]).unwrap();

        let plan = EncodePlan::new(&source, Some(work.path()), None).unwrap();
        std::fs::write(plan.output(), vec![0u8; 1024 * 1024]).unwrap();
        let temp_dir = plan.output().parent().unwrap().to_path_buf();

        let report = plan.finish().await.unwrap();

        assert_eq!(report.original_mib, 3);
        assert_eq!(report.new_mib, 1);
        assert_eq!(report.destination, library.path().join("ep1.mp4"));
        assert!(report.destination.exists());
        assert!(!source.exists());
        assert!(!temp_dir.exists());
    }

    #[tokio::test]
    async fn test_finish_overwrites_mp4_source_in_place() {
        let library = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let source = library.path().join("ep1.mp4");
        std::fs::write(&source, vec![0u8; 2 * 1024 * 1024]).unwrap();

        let plan = EncodePlan::new(&source, Some(work.path()), None).unwrap();
        std::fs::write(plan.output(), b"small").unwrap();

        let report = plan.finish().await.unwrap();

        assert_eq!(report.destination, source);
        assert_eq!(std::fs::read(&source).unwrap(), b"small");
        assert_eq!(report.new_mib, 0);
    }

    #[tokio::test]
    async fn test_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mkv");
        let b = dir.path().join("b.mkv");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        std::fs::create_dir(dir.path().join("x")).unwrap();

        assert!(same_file(&a, &a).await);
        assert!(same_file(&a, &dir.path().join("x/../a.mkv")).await);
        assert!(!same_file(&a, &b).await);
        assert!(!same_file(&a, &dir.path().join("a.mp4")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finish_keeps_source_that_aliases_destination() {
        let library = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let source = library.path().join("clip.avi");
        std::fs::write(&source, vec![0u8; 1024 * 1024]).unwrap();
        // Another name for the same file, as on a case-insensitive volume
        std::fs::hard_link(&source, library.path().join("clip.mp4")).unwrap();

        let plan = EncodePlan::new(&source, Some(work.path()), None).unwrap();
        std::fs::write(plan.output(), b"small").unwrap();

        let report = plan.finish().await.unwrap();

        assert_eq!(std::fs::read(&report.destination).unwrap(), b"small");
        assert!(source.exists());
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        const PROBE_H264_1080P: &str = r#"cat <<'JSON'
{"streams": [{"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}],
 "format": {"format_name": "matroska,webm", "size": "1048576", "bit_rate": "6000000"}}
JSON"#;

        fn fake_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        struct Fixture {
            bin: tempfile::TempDir,
            library: tempfile::TempDir,
            work: tempfile::TempDir,
        }

        impl Fixture {
            fn new() -> Self {
                Self {
                    bin: tempfile::tempdir().unwrap(),
                    library: tempfile::tempdir().unwrap(),
                    work: tempfile::tempdir().unwrap(),
                }
            }

            fn video(&self, name: &str) -> PathBuf {
                let path = self.library.path().join(name);
                std::fs::write(&path, vec![0u8; 2 * 1024 * 1024]).unwrap();
                path
            }

            fn pipeline(&self, ffprobe: &str, ffmpeg: &str) -> FfmpegPipeline {
                FfmpegPipeline::new(EncodeSettings {
                    ffprobe: fake_tool(self.bin.path(), "ffprobe", ffprobe),
                    ffmpeg: fake_tool(self.bin.path(), "ffmpeg", ffmpeg),
                    work_dir: Some(self.work.path().to_path_buf()),
                    timeout: Some(Duration::from_millis(300)),
                    ..EncodeSettings::default()
                })
            }
        }

        async fn plan_for(pipeline: &FfmpegPipeline, file: &Path) -> EncodePlan {
            match pipeline.scan(file).await.unwrap() {
                ScanOutcome::Plan(plan) => plan,
                ScanOutcome::NotApplicable(reason) => panic!("unexpected skip: {}", reason),
            }
        }

        #[tokio::test]
        async fn test_unreadable_video_is_a_subprocess_failure() {
            let fixture = Fixture::new();
            let file = fixture.video("corrupt.mkv");
            let pipeline = fixture.pipeline("echo 'moov atom not found' >&2\nexit 1", "exit 0");

            let err = pipeline.scan(&file).await.unwrap_err();

            assert!(matches!(err, MediaError::FfprobeFailed { .. }));
            assert!(err.is_subprocess_failure());
        }

        #[tokio::test]
        async fn test_wide_h264_gets_scaled_plan() {
            let fixture = Fixture::new();
            let file = fixture.video("movie.mkv");
            let pipeline = fixture.pipeline(PROBE_H264_1080P, "exit 0");

            let plan = plan_for(&pipeline, &file).await;

            assert_eq!(plan.scale_filter(), Some("scale=1280:-2"));
            assert!(plan.output().starts_with(fixture.work.path()));
        }

        #[tokio::test]
        async fn test_hevc_under_target_is_not_applicable() {
            let fixture = Fixture::new();
            let file = fixture.video("done.mkv");
            let probe = PROBE_H264_1080P
                .replace("h264", "hevc")
                .replace("6000000", "1500000");
            let pipeline = fixture.pipeline(&probe, "exit 0");

            let outcome = pipeline.scan(&file).await.unwrap();
            assert!(matches!(outcome, ScanOutcome::NotApplicable(_)));
        }

        #[tokio::test]
        async fn test_ffmpeg_exit_carries_stderr_tail() {
            let fixture = Fixture::new();
            let file = fixture.video("movie.mkv");
            let pipeline = fixture.pipeline(
                PROBE_H264_1080P,
                "echo 'Unknown encoder libx265' >&2\nexit 1",
            );

            let plan = plan_for(&pipeline, &file).await;
            let err = pipeline.reencode(&plan).await.unwrap_err();

            match &err {
                MediaError::FfmpegFailed {
                    stderr, exit_code, ..
                } => {
                    assert_eq!(*exit_code, Some(1));
                    assert!(stderr.as_deref().unwrap_or("").contains("Unknown encoder"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert!(err.is_subprocess_failure());
        }

        #[tokio::test]
        async fn test_hung_ffmpeg_times_out() {
            let fixture = Fixture::new();
            let file = fixture.video("movie.mkv");
            let pipeline = fixture.pipeline(PROBE_H264_1080P, "exec sleep 30");

            let plan = plan_for(&pipeline, &file).await;
            let err = pipeline.reencode(&plan).await.unwrap_err();

            assert!(matches!(err, MediaError::Timeout(_)));
            assert!(err.is_subprocess_failure());
        }

        #[tokio::test]
        async fn test_missing_ffmpeg() {
            let fixture = Fixture::new();
            let file = fixture.video("movie.mkv");
            let mut pipeline = fixture.pipeline(PROBE_H264_1080P, "exit 0");
            pipeline.settings.ffmpeg = fixture.bin.path().join("no-such-ffmpeg");

            let plan = plan_for(&pipeline, &file).await;
            let err = pipeline.reencode(&plan).await.unwrap_err();

            assert!(matches!(err, MediaError::FfmpegNotFound));
            assert!(err.is_subprocess_failure());
        }

        #[tokio::test]
        async fn test_full_run_replaces_source() {
            let fixture = Fixture::new();
            let file = fixture.video("movie.mkv");
            let pipeline = fixture.pipeline(
                PROBE_H264_1080P,
                "for last; do :; done\nprintf small > \"$last\"",
            );

            let plan = plan_for(&pipeline, &file).await;
            pipeline.reencode(&plan).await.unwrap();
            let report = pipeline.cleanup(plan).await.unwrap();

            assert_eq!(report.original_mib, 2);
            assert_eq!(report.new_mib, 0);
            assert_eq!(report.destination, fixture.library.path().join("movie.mp4"));
            assert_eq!(std::fs::read(&report.destination).unwrap(), b"small");
            assert!(!file.exists());
        }
    }
}
