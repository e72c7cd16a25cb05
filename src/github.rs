//! GitHub issue source backed by the `gh` CLI.
//!
//! All tracker access goes through `gh` subprocesses: issue listings via
//! `gh issue list`, event histories via `gh api`, repository detection via
//! `gh repo view` with a `git remote` fallback. Pure JSON parsing is split
//! into free functions so it can be tested without a `gh` binary.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::config::Config;
use crate::logger::Logger;
use crate::models::{Issue, LabelEvent, RepoInfo};
use crate::watcher::IssueSource;
use crate::{Error, Result};

/// JSON fields requested from `gh issue list`.
const ISSUE_LIST_FIELDS: &str = "number,title,labels,url,updatedAt";

/// Issue record as returned by `gh issue list --json`.
#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    labels: Vec<GhLabel>,
    url: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

/// Event record as returned by `gh api repos/{o}/{r}/issues/{n}/events`.
#[derive(Debug, Deserialize)]
struct GhIssueEvent {
    event: String,
    #[serde(default)]
    label: Option<GhLabel>,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhRepoView {
    owner: GhOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhOwner {
    login: String,
}

/// Map `gh issue list` output onto domain issues for one repository.
///
/// Issues are fetched with `--assignee @me`, so the assignee field is
/// always the current user; the tracker output does not repeat it.
fn parse_issue_list(json: &str, repo: &str) -> Result<Vec<Issue>> {
    let raw: Vec<GhIssue> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|issue| Issue {
            number: issue.number,
            title: issue.title,
            state: "open".to_string(),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            assignee: None,
            repo: repo.to_string(),
            url: issue.url,
            updated_at: issue.updated_at,
        })
        .collect())
}

/// Map an event-history response onto label events, preserving delivery
/// order. Entries that are not `labeled` actions (or carry no label) are
/// dropped.
fn parse_label_events(json: &str, repo: &str, issue_number: u64) -> Result<Vec<LabelEvent>> {
    let raw: Vec<GhIssueEvent> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .filter(|ev| ev.event == "labeled")
        .filter_map(|ev| {
            let label = ev.label?;
            Some(LabelEvent {
                repo: repo.to_string(),
                issue_number,
                action: "labeled".to_string(),
                label: label.name,
                timestamp: ev.created_at.unwrap_or_default(),
            })
        })
        .collect())
}

/// Extract owner/name from a git remote URL (ssh or https form).
fn parse_remote_url(url: &str) -> Option<RepoInfo> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"github\.com[:/]([^/]+)/([^/.\s]+)").expect("hardcoded pattern compiles")
    });
    let caps = re.captures(url)?;
    let owner = caps.get(1)?.as_str().to_string();
    let name = caps.get(2)?.as_str().to_string();
    let full_name = format!("{}/{}", owner, name);
    Some(RepoInfo {
        owner,
        name,
        full_name,
    })
}

/// GitHub client shelling out to `gh`.
#[derive(Debug, Clone)]
pub struct GithubClient {
    work_dir: PathBuf,
    repos: Vec<String>,
    logger: Logger,
}

impl GithubClient {
    pub fn new(config: &Config, logger: Logger) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            repos: config.repos.clone(),
            logger,
        }
    }

    /// Verify the `gh` binary exists and is authenticated.
    ///
    /// Both checks are fatal configuration errors at startup: without an
    /// authenticated CLI no poll cycle can succeed.
    pub async fn ensure_available(&self) -> Result<()> {
        let version = Command::new("gh")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match version {
            Ok(status) if status.success() => {}
            _ => return Err(Error::GhNotInstalled),
        }

        // `gh auth status` writes informational text to stderr even on
        // success; only the exit code matters.
        let auth = Command::new("gh")
            .args(["auth", "status"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match auth {
            Ok(status) if status.success() => Ok(()),
            _ => Err(Error::GhNotAuthenticated),
        }
    }

    /// Login of the authenticated user.
    pub async fn current_user(&self) -> Result<String> {
        let output = self.run_gh(&["api", "user", "--jq", ".login"]).await?;
        Ok(output.trim().to_string())
    }

    /// Resolve the repository for the working directory.
    ///
    /// Tries `gh repo view` first, then falls back to parsing the origin
    /// remote URL. Returns `None` when the directory is not a git
    /// repository or has no recognizable GitHub remote.
    pub async fn current_repo_info(&self) -> Option<RepoInfo> {
        if !self.work_dir.join(".git").exists() {
            return None;
        }

        if let Ok(output) = self.run_gh(&["repo", "view", "--json", "owner,name"]).await {
            if let Ok(view) = serde_json::from_str::<GhRepoView>(&output) {
                let full_name = format!("{}/{}", view.owner.login, view.name);
                return Some(RepoInfo {
                    owner: view.owner.login,
                    name: view.name,
                    full_name,
                });
            }
        }

        let remote = Command::new("git")
            .args(["remote", "get-url", "origin"])
            .current_dir(&self.work_dir)
            .output()
            .await
            .ok()?;
        if !remote.status.success() {
            return None;
        }
        let url = String::from_utf8_lossy(&remote.stdout);
        parse_remote_url(url.trim())
    }

    async fn run_gh(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("gh")
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!(
                "gh {}: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Fetch assigned open issues for one explicitly configured repo.
    async fn issues_for_repo(&self, repo: &str) -> Result<Vec<Issue>> {
        let output = self
            .run_gh(&[
                "issue",
                "list",
                "--repo",
                repo,
                "--assignee",
                "@me",
                "--state",
                "open",
                "--json",
                ISSUE_LIST_FIELDS,
            ])
            .await?;
        parse_issue_list(&output, repo)
    }

    /// Fetch assigned open issues for the working directory's repository.
    async fn issues_for_working_dir(&self) -> Result<Vec<Issue>> {
        let repo = self.current_repo_info().await.ok_or_else(|| {
            Error::NoRepository(format!(
                "{} has no GitHub remote; run cn inside a repository or pass --repo",
                self.work_dir.display()
            ))
        })?;

        let fetched = async {
            let output = self
                .run_gh(&[
                    "issue",
                    "list",
                    "--assignee",
                    "@me",
                    "--state",
                    "open",
                    "--json",
                    ISSUE_LIST_FIELDS,
                ])
                .await?;
            parse_issue_list(&output, &repo.full_name)
        }
        .await;

        // A transient fetch failure degrades to an empty list so the poll
        // loop keeps running; only "not in a repository" is fatal
        match fetched {
            Ok(issues) => Ok(issues),
            Err(e) => {
                self.logger.error(
                    "failed to fetch issues for repository",
                    Some(serde_json::json!({"repo": repo.full_name, "error": e.to_string()})),
                );
                Ok(Vec::new())
            }
        }
    }
}

impl IssueSource for GithubClient {
    /// List open issues assigned to the current user across all
    /// configured repositories.
    ///
    /// With explicit repos, a fetch failure for one repository is logged
    /// and its issues are omitted; the scan continues. In working-dir
    /// mode there is only one repository, so its failure propagates.
    async fn list_assigned_open_issues(&self) -> Result<Vec<Issue>> {
        if self.repos.is_empty() {
            return self.issues_for_working_dir().await;
        }

        let mut issues = Vec::new();
        for repo in &self.repos {
            match self.issues_for_repo(repo).await {
                Ok(mut fetched) => issues.append(&mut fetched),
                Err(e) => {
                    self.logger.error(
                        "failed to fetch issues for repository",
                        Some(serde_json::json!({"repo": repo, "error": e.to_string()})),
                    );
                }
            }
        }
        Ok(issues)
    }

    async fn list_label_events(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Vec<LabelEvent>> {
        let endpoint = format!("repos/{}/{}/issues/{}/events", owner, repo, issue_number);
        let output = self.run_gh(&["api", &endpoint]).await?;
        let full_name = format!("{}/{}", owner, repo);
        parse_label_events(&output, &full_name, issue_number)
    }
}
