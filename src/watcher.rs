//! Issue watcher - the poll-cycle core.
//!
//! Combines the issue source and the event cache to decide, once per
//! poll, which trigger-label applications are genuinely new. Everything
//! here is deliberately stateless beyond those two collaborators; the
//! execution-status overlay lives in the presentation layer.

use crate::cache::EventCache;
use crate::logger::Logger;
use crate::models::{Issue, LabelEvent};
use crate::Result;

/// Tracker collaborator interface.
///
/// Both operations may fail per-call; callers tolerate partial failure
/// without aborting the scan.
#[allow(async_fn_in_trait)]
pub trait IssueSource {
    /// Open issues assigned to the current user across all configured
    /// repositories.
    async fn list_assigned_open_issues(&self) -> Result<Vec<Issue>>;

    /// Labeling events for one issue, in tracker delivery order.
    async fn list_label_events(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Vec<LabelEvent>>;
}

/// Split an "owner/name" repository identifier. Returns `None` when
/// either side is missing or empty.
fn split_repo(repo: &str) -> Option<(&str, &str)> {
    let (owner, name) = repo.split_once('/')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner, name))
}

/// Orchestrates the issue source and event cache.
pub struct IssueWatcher<S: IssueSource> {
    source: S,
    cache: EventCache,
    trigger_label: String,
    logger: Logger,
}

impl<S: IssueSource> IssueWatcher<S> {
    pub fn new(source: S, cache: EventCache, trigger_label: &str, logger: Logger) -> Self {
        Self {
            source,
            cache,
            trigger_label: trigger_label.to_string(),
            logger,
        }
    }

    /// Compute the issues whose trigger label was applied since the last
    /// poll, marking each detected event fingerprint as processed.
    ///
    /// An issue is reported at most once per call: the first unprocessed
    /// matching event in delivery order wins and ends the scan for that
    /// issue. Re-labeling at a later, distinct timestamp produces a new
    /// fingerprint and legitimately re-triggers.
    pub async fn check_for_newly_triggered(&self) -> Result<Vec<Issue>> {
        let issues = self.source.list_assigned_open_issues().await?;

        let mut triggered = Vec::new();
        for issue in issues {
            // Cheap pre-filter: no trigger label, no event-history fetch
            if !issue.labels.iter().any(|l| l == &self.trigger_label) {
                continue;
            }

            let Some((owner, name)) = split_repo(&issue.repo) else {
                self.logger.warn(
                    "skipping issue with malformed repository identifier",
                    Some(serde_json::json!({"repo": issue.repo, "issue": issue.number})),
                );
                continue;
            };

            let events = match self.source.list_label_events(owner, name, issue.number).await {
                Ok(events) => events,
                Err(e) => {
                    self.logger.error(
                        "failed to fetch events for issue",
                        Some(serde_json::json!({
                            "repo": issue.repo,
                            "issue": issue.number,
                            "error": e.to_string(),
                        })),
                    );
                    continue;
                }
            };

            for event in events {
                if event.label != self.trigger_label {
                    continue;
                }
                let fingerprint = event.fingerprint();
                if self.cache.is_processed(&fingerprint) {
                    // Already handled; a later unprocessed re-label may
                    // still count, so keep scanning this issue
                    continue;
                }

                triggered.push(issue.clone());
                if let Err(e) = self.cache.add_processed(&fingerprint) {
                    // The trigger stays detected; worst case it is
                    // re-processed on the next poll
                    self.logger.error(
                        "failed to persist processed event",
                        Some(serde_json::json!({
                            "fingerprint": fingerprint,
                            "error": e.to_string(),
                        })),
                    );
                }
                break;
            }
        }

        Ok(triggered)
    }

    /// All open issues assigned to the current user, unfiltered. No cache
    /// interaction.
    pub async fn list_assigned(&self) -> Result<Vec<Issue>> {
        self.source.list_assigned_open_issues().await
    }
}
