//! Job lifecycle state machine.
//!
//! On the wire a job's status is free-form text where two prefixes carry
//! meaning: `Done…` marks success and `Error…` marks failure. Internally the
//! status is a tagged variant so every transition is checked exhaustively.

use std::fmt;

/// Status text of a freshly pushed job.
pub const QUEUED: &str = "queued";
/// Status text of a job handed to a worker by pop.
pub const DISPATCHED: &str = "dispatched";
/// Reserved prefix marking a successful terminal status.
pub const DONE_PREFIX: &str = "Done";
/// Reserved prefix marking a failed terminal status.
pub const ERROR_PREFIX: &str = "Error";

/// Job processing status.
///
/// `queued → dispatched → {in-progress}* → succeeded | failed`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    /// Waiting in the dispatch queue
    #[default]
    Queued,
    /// Claimed by a worker, nothing reported yet
    Dispatched,
    /// Informational status posted by the worker
    InProgress(String),
    /// Terminal, posted text started with `Done`
    Succeeded(String),
    /// Terminal, posted text started with `Error`
    Failed(String),
}

impl JobStatus {
    /// Classify a status text posted by a worker, ignoring prior state.
    pub fn from_report(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.starts_with(DONE_PREFIX) {
            JobStatus::Succeeded(text)
        } else if text.starts_with(ERROR_PREFIX) {
            JobStatus::Failed(text)
        } else {
            JobStatus::InProgress(text)
        }
    }

    /// Next status after a worker posts `text`.
    ///
    /// Reserved prefixes always decide the outcome. Any other text on a
    /// terminal job replaces the text but keeps the terminal kind, so
    /// `done`/`success` never revert.
    pub fn apply_report(&self, text: impl Into<String>) -> Self {
        match (self, JobStatus::from_report(text)) {
            (JobStatus::Succeeded(_), JobStatus::InProgress(text)) => JobStatus::Succeeded(text),
            (JobStatus::Failed(_), JobStatus::InProgress(text)) => JobStatus::Failed(text),
            (_, next) => next,
        }
    }

    /// Rebuild a status from its wire representation.
    pub fn from_parts(text: impl Into<String>, done: bool, success: Option<bool>) -> Self {
        let text = text.into();
        match (done, success) {
            (true, Some(false)) => JobStatus::Failed(text),
            (true, _) => JobStatus::Succeeded(text),
            (false, _) if text == QUEUED => JobStatus::Queued,
            (false, _) if text == DISPATCHED => JobStatus::Dispatched,
            (false, _) => JobStatus::InProgress(text),
        }
    }

    /// Wire text of the status.
    pub fn text(&self) -> &str {
        match self {
            JobStatus::Queued => QUEUED,
            JobStatus::Dispatched => DISPATCHED,
            JobStatus::InProgress(text) | JobStatus::Succeeded(text) | JobStatus::Failed(text) => {
                text
            }
        }
    }

    /// Check if this is a terminal state (the `done` flag).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded(_) | JobStatus::Failed(_))
    }

    /// The `success` flag: unset until terminal.
    pub fn success(&self) -> Option<bool> {
        match self {
            JobStatus::Succeeded(_) => Some(true),
            JobStatus::Failed(_) => Some(false),
            _ => None,
        }
    }

    /// Lifecycle phase name, used for stats and metric labels.
    pub fn phase(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Dispatched => "dispatched",
            JobStatus::InProgress(_) => "in_progress",
            JobStatus::Succeeded(_) => "succeeded",
            JobStatus::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_prefixes() {
        let done = JobStatus::from_report("Done - reduced from 800MiB to 300MiB");
        assert!(done.is_terminal());
        assert_eq!(done.success(), Some(true));
        assert_eq!(done.text(), "Done - reduced from 800MiB to 300MiB");

        let failed = JobStatus::from_report("Error - error from subprocess");
        assert!(failed.is_terminal());
        assert_eq!(failed.success(), Some(false));

        let note = JobStatus::from_report("reencoding");
        assert!(!note.is_terminal());
        assert_eq!(note.success(), None);
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        assert!(!JobStatus::from_report("done already").is_terminal());
        assert!(!JobStatus::from_report("error-ish").is_terminal());
        assert!(JobStatus::from_report("Doneness").is_terminal());
    }

    #[test]
    fn test_note_after_terminal_keeps_outcome() {
        let done = JobStatus::from_report("Done");
        let after = done.apply_report("cleaning up");
        assert_eq!(after, JobStatus::Succeeded("cleaning up".to_string()));

        let failed = JobStatus::from_report("Error - boom");
        let after = failed.apply_report("retrying");
        assert_eq!(after.success(), Some(false));
        assert_eq!(after.text(), "retrying");
    }

    #[test]
    fn test_reserved_prefix_after_terminal_wins() {
        let done = JobStatus::from_report("Done");
        assert_eq!(done.apply_report("Error - late").success(), Some(false));
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(JobStatus::from_parts("queued", false, None), JobStatus::Queued);
        assert_eq!(JobStatus::from_parts("dispatched", false, None), JobStatus::Dispatched);
        assert_eq!(
            JobStatus::from_parts("reencoding", false, None),
            JobStatus::InProgress("reencoding".to_string())
        );
        assert_eq!(
            JobStatus::from_parts("retrying", true, Some(false)),
            JobStatus::Failed("retrying".to_string())
        );
        assert!(JobStatus::from_parts("Done", true, Some(true)).is_terminal());
    }
}
