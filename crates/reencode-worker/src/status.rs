//! Status texts a worker posts for a job.

use reencode_media::SizeReport;

use crate::error::WorkerError;

/// Posted before ffmpeg starts.
pub const REENCODING: &str = "reencoding";
/// Posted before the output replaces the source.
pub const CLEANING_UP: &str = "cleaning up";
/// Terminal: nothing to do for this file.
pub const ALREADY_PROCESSED: &str = "Done - already processed";
/// Terminal: ffmpeg/ffprobe missing, failed or timed out.
pub const SUBPROCESS_ERROR: &str = "Error - error from subprocess";
/// Terminal: anything else went wrong.
pub const UNKNOWN_ERROR: &str = "Error - unknown error processing file";

/// Terminal text for a successful re-encode.
pub fn reduced(report: &SizeReport) -> String {
    format!(
        "Done - reduced from {}MiB to {}MiB",
        report.original_mib, report.new_mib
    )
}

/// Terminal text for a failed job.
pub fn for_error(error: &WorkerError) -> &'static str {
    if error.is_subprocess_failure() {
        SUBPROCESS_ERROR
    } else {
        UNKNOWN_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reencode_media::MediaError;
    use reencode_models::JobStatus;
    use std::path::PathBuf;

    #[test]
    fn test_reduced() {
        let report = SizeReport {
            original_mib: 800,
            new_mib: 300,
            destination: PathBuf::from("/videos/a.mp4"),
        };
        assert_eq!(reduced(&report), "Done - reduced from 800MiB to 300MiB");
    }

    #[test]
    fn test_for_error() {
        let subprocess = WorkerError::from(MediaError::ffmpeg_failed("exit 1", None, Some(1)));
        assert_eq!(for_error(&subprocess), SUBPROCESS_ERROR);

        let other = WorkerError::from(MediaError::internal("boom"));
        assert_eq!(for_error(&other), UNKNOWN_ERROR);
        assert_eq!(for_error(&WorkerError::job_failed("panic")), UNKNOWN_ERROR);
    }

    #[test]
    fn test_texts_classify_as_intended() {
        assert!(!JobStatus::from_report(REENCODING).is_terminal());
        assert!(!JobStatus::from_report(CLEANING_UP).is_terminal());
        assert_eq!(JobStatus::from_report(ALREADY_PROCESSED).success(), Some(true));
        assert_eq!(JobStatus::from_report(SUBPROCESS_ERROR).success(), Some(false));
        assert_eq!(JobStatus::from_report(UNKNOWN_ERROR).success(), Some(false));
    }
}
