//! Domain types shared across the watcher, invoker, and dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub issue assigned to the current user.
///
/// Normalized from the tracker's wire format. The execution status overlay
/// is *not* part of this type - it lives in the presentation layer, keyed
/// by issue number (see [`IssueActivity`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number, unique within a repository
    pub number: u64,
    /// Issue title
    pub title: String,
    /// Issue state ("open" - closed issues are never fetched)
    pub state: String,
    /// Label names in the order the tracker returned them
    pub labels: Vec<String>,
    /// Assignee login, if the tracker reported one
    pub assignee: Option<String>,
    /// Repository in "owner/name" form
    pub repo: String,
    /// Canonical issue URL
    pub url: String,
    /// Last-updated timestamp as reported by the tracker
    pub updated_at: String,
}

/// One "labeled" action on one issue, as delivered by the tracker's
/// event history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEvent {
    /// Repository in "owner/name" form
    pub repo: String,
    /// Issue the label was applied to
    pub issue_number: u64,
    /// Event action kind (always "labeled" for events we keep)
    pub action: String,
    /// Name of the label that was applied
    pub label: String,
    /// Event timestamp as delivered by the tracker
    pub timestamp: String,
}

impl LabelEvent {
    /// Deterministic fingerprint identifying this label-application event.
    ///
    /// Two events with identical fields produce identical fingerprints;
    /// this is the unit of deduplication in the event cache. The encoding
    /// is not collision-free if field values contain the separators, which
    /// is acceptable for repository names and label names in practice.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}#{}:{}:{}:{}",
            self.repo, self.issue_number, self.action, self.label, self.timestamp
        )
    }
}

/// Execution status of the assistant for one issue.
///
/// Advisory and display-only: it never gates re-invocation and is not
/// persisted across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionStatus {
    /// No invocation attempted since the process started
    #[default]
    Idle,
    /// Assistant subprocess is running
    Running,
    /// Last invocation exited successfully
    Completed,
    /// Last invocation failed; carries a human-readable message
    Error(String),
}

impl ExecutionStatus {
    /// Short lowercase name for display.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error(_) => "error",
        }
    }
}

/// Per-issue execution overlay owned by the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct IssueActivity {
    /// Current execution status
    pub status: ExecutionStatus,
    /// When the assistant was last launched for this issue
    pub last_executed: Option<DateTime<Utc>>,
}

/// Repository identity resolved from the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub owner: String,
    pub name: String,
    pub full_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(repo: &str, number: u64, label: &str, ts: &str) -> LabelEvent {
        LabelEvent {
            repo: repo.to_string(),
            issue_number: number,
            action: "labeled".to_string(),
            label: label.to_string(),
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_fingerprint_format() {
        let ev = event("o/r", 42, "implement", "2025-01-01T00:00:00Z");
        assert_eq!(ev.fingerprint(), "o/r#42:labeled:implement:2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = event("o/r", 7, "implement", "T1");
        let b = event("o/r", 7, "implement", "T1");
        assert_eq!(a.fingerprint(), b.fingerprint());
        // Pure: repeated calls on the same value agree
        assert_eq!(a.fingerprint(), a.fingerprint());
    }

    #[test]
    fn test_fingerprint_differs_per_field() {
        let base = event("o/r", 7, "implement", "T1");
        let variants = [
            event("o/other", 7, "implement", "T1"),
            event("o/r", 8, "implement", "T1"),
            event("o/r", 7, "bug", "T1"),
            event("o/r", 7, "implement", "T2"),
        ];
        for v in &variants {
            assert_ne!(base.fingerprint(), v.fingerprint());
        }
        let mut unlabeled = base.clone();
        unlabeled.action = "unlabeled".to_string();
        assert_ne!(base.fingerprint(), unlabeled.fingerprint());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(ExecutionStatus::Idle.name(), "idle");
        assert_eq!(ExecutionStatus::Running.name(), "running");
        assert_eq!(ExecutionStatus::Completed.name(), "completed");
        assert_eq!(ExecutionStatus::Error("boom".to_string()).name(), "error");
    }

    #[test]
    fn test_default_status_is_idle() {
        assert_eq!(IssueActivity::default().status, ExecutionStatus::Idle);
    }

    #[test]
    fn test_issue_serde_round_trip() {
        let issue = Issue {
            number: 42,
            title: "Add retry".to_string(),
            state: "open".to_string(),
            labels: vec!["implement".to_string(), "bug".to_string()],
            assignee: Some("octocat".to_string()),
            repo: "o/r".to_string(),
            url: "https://github.com/o/r/issues/42".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&issue).unwrap();
        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(issue, back);
    }
}
