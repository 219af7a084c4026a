//! Per-file outcomes and the pass summary

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::SessionId;

/// What happened to a single file that did not error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Downloaded, ingested and recorded
    Ingested {
        /// Notification the success was reported under
        notification_id: Uuid,
    },

    /// Not modified since the last pass, or excluded for the provider
    UpToDate,
}

/// A file that failed during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Remote path of the file
    pub file_name: String,
    /// Rendered error
    pub error: String,
    /// Whether a later pass may succeed
    pub retryable: bool,
}

/// Summary of one sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub session_id: SessionId,

    /// Files found by discovery
    pub discovered: usize,

    /// Files dropped because an earlier pass rejected their format
    pub previously_rejected: usize,

    pub ingested: usize,

    /// Files that were up to date
    pub skipped: usize,

    /// Files newly rejected for their format this pass
    pub unsupported: usize,

    pub failed: usize,

    /// Files never started because the pass was cancelled or timed out
    pub cancelled: usize,

    /// Ids discovery could not resolve
    pub discovery_warnings: Vec<String>,

    /// A retryable discovery failure may have hidden files from this pass
    pub discovery_incomplete: bool,

    pub failures: Vec<FileFailure>,

    /// Whether the session's high-water mark moved this pass
    pub mark_advanced: bool,

    /// High-water mark after the pass
    pub last_synced: Option<DateTime<Utc>>,
}

impl PassReport {
    pub(crate) fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    /// True when any retryable failure occurred, in discovery or per file
    pub fn has_retryable_failures(&self) -> bool {
        self.discovery_incomplete || self.failures.iter().any(|failure| failure.retryable)
    }

    /// Files the pass finished handling, whatever the outcome
    pub fn settled(&self) -> usize {
        self.ingested + self.skipped + self.unsupported + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_failures() {
        let mut report = PassReport::new(7);
        assert!(!report.has_retryable_failures());

        report.failures.push(FileFailure {
            file_name: "gone.pdf".to_string(),
            error: "not found".to_string(),
            retryable: false,
        });
        assert!(!report.has_retryable_failures());

        report.failures.push(FileFailure {
            file_name: "slow.pdf".to_string(),
            error: "timeout".to_string(),
            retryable: true,
        });
        assert!(report.has_retryable_failures());
    }

    #[test]
    fn test_incomplete_discovery_is_retryable() {
        let mut report = PassReport::new(7);
        report.discovery_warnings.push("Discovery failed for docs".to_string());
        assert!(!report.has_retryable_failures());

        report.discovery_incomplete = true;
        assert!(report.has_retryable_failures());
    }
}
