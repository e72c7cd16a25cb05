//! TUI application - main event loop and poll scheduling.
//!
//! This module contains the core dashboard logic:
//! - Terminal setup and restoration
//! - The fixed-interval poll loop that auto-invokes the assistant
//! - Keyboard handling for selection and manual invocation
//! - The per-issue execution status overlay

use std::collections::HashMap;
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::views::{DashboardProps, PromptAction, PromptInput, render_dashboard};
use crate::Result;
use crate::cache::EventCache;
use crate::config::Config;
use crate::github::GithubClient;
use crate::invoker::{AssistantInvoker, InvokeOptions, OutputSink};
use crate::logger::Logger;
use crate::models::{ExecutionStatus, Issue, IssueActivity};
use crate::watcher::IssueWatcher;

/// Fixed poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Messages flowing from spawned tasks back into the event loop.
enum AppEvent {
    /// Execution status transition for one issue
    Status(u64, ExecutionStatus),
    /// A poll cycle finished; `issues` is the refreshed full list when
    /// the refresh succeeded
    PollFinished {
        issues: Option<Vec<Issue>>,
        error: Option<String>,
    },
    /// A manually triggered invocation finished
    InvocationDone { error: Option<String> },
}

/// Action resolved from a key press that the event loop must carry out.
enum UserAction {
    Refresh,
    Invoke(Issue, Option<String>),
}

/// Dashboard application state.
struct App {
    issues: Vec<Issue>,
    /// Execution overlay keyed by issue number; the watcher core never
    /// sees this
    activity: HashMap<u64, IssueActivity>,
    selected: usize,
    loading: bool,
    last_check: Option<DateTime<Utc>>,
    error: Option<String>,
    prompt: Option<PromptInput>,
    should_quit: bool,
    poll_in_flight: bool,
    user: Option<String>,
    trigger_label: String,
}

impl App {
    fn new(trigger_label: &str, user: Option<String>) -> Self {
        Self {
            issues: Vec::new(),
            activity: HashMap::new(),
            selected: 0,
            loading: false,
            last_check: None,
            error: None,
            prompt: None,
            should_quit: false,
            poll_in_flight: false,
            user,
            trigger_label: trigger_label.to_string(),
        }
    }

    /// Handle a key press. Returns an action for the event loop when the
    /// press resolved to one.
    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Option<UserAction> {
        if key == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }

        // Prompt overlay captures all input while open
        if let Some(prompt) = self.prompt.as_mut() {
            return match prompt.handle_key(key) {
                PromptAction::Pending => None,
                PromptAction::Cancel => {
                    self.prompt = None;
                    None
                }
                PromptAction::Submit(custom) => {
                    let issue = prompt.issue().clone();
                    self.prompt = None;
                    Some(UserAction::Invoke(issue, custom))
                }
            };
        }

        match key {
            KeyCode::Char('q') => {
                self.should_quit = true;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.issues.len() {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Char('r') => Some(UserAction::Refresh),
            KeyCode::Enter => {
                if let Some(issue) = self.issues.get(self.selected) {
                    self.prompt = Some(PromptInput::new(issue.clone()));
                }
                None
            }
            _ => None,
        }
    }

    /// Apply a message from a spawned task.
    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Status(number, status) => {
                let entry = self.activity.entry(number).or_default();
                if status == ExecutionStatus::Running {
                    entry.last_executed = Some(Utc::now());
                }
                if let ExecutionStatus::Error(message) = &status {
                    self.error = Some(message.clone());
                }
                entry.status = status;
            }
            AppEvent::PollFinished { issues, error } => {
                self.poll_in_flight = false;
                self.loading = false;
                self.last_check = Some(Utc::now());
                if let Some(issues) = issues {
                    // Known statuses survive the refresh; issues without a
                    // recorded status default to idle at render time
                    self.issues = issues;
                    if self.selected >= self.issues.len() {
                        self.selected = self.issues.len().saturating_sub(1);
                    }
                }
                if let Some(error) = error {
                    self.error = Some(error);
                }
            }
            AppEvent::InvocationDone { error } => {
                if let Some(error) = error {
                    self.error = Some(error);
                }
            }
        }
    }

    fn mark_poll_started(&mut self) {
        self.poll_in_flight = true;
        self.loading = true;
        self.error = None;
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        if let Some(prompt) = &self.prompt {
            prompt.render(frame, area);
            return;
        }
        let props = DashboardProps {
            issues: &self.issues,
            activity: &self.activity,
            selected: self.selected,
            loading: self.loading,
            last_check: self.last_check,
            error: self.error.as_deref(),
            user: self.user.as_deref(),
            trigger_label: &self.trigger_label,
        };
        render_dashboard(frame, area, &props);
    }
}

/// Open an append-mode sink for assistant output under the log dir.
///
/// Falling back to `None` routes output to the process's own streams,
/// which is the documented default when no sink is available.
async fn assistant_sink(log_dir: &Path, issue_number: u64) -> Option<OutputSink> {
    tokio::fs::create_dir_all(log_dir).await.ok()?;
    let path = log_dir.join(format!("assistant-issue-{}.log", issue_number));
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .ok()?;
    Some(Box::new(file))
}

/// Invocation options with output routed to per-issue log files.
async fn logged_invoke_options(log_dir: &Path, issue_number: u64) -> InvokeOptions<'static> {
    InvokeOptions {
        stdout: assistant_sink(log_dir, issue_number).await,
        stderr: assistant_sink(log_dir, issue_number).await,
        ..InvokeOptions::default()
    }
}

/// Run one full poll cycle off the event loop: detect newly triggered
/// issues, auto-invoke the assistant for each, then refresh the full
/// assigned list for display.
fn spawn_poll(
    watcher: Arc<IssueWatcher<GithubClient>>,
    invoker: Arc<AssistantInvoker>,
    logger: Logger,
    log_dir: PathBuf,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        logger.info("checking for new labeled issues", None);

        let new_issues = match watcher.check_for_newly_triggered().await {
            Ok(issues) => issues,
            Err(e) => {
                logger.error("failed to check issues", Some(serde_json::json!({"error": e.to_string()})));
                let _ = tx.send(AppEvent::PollFinished {
                    issues: None,
                    error: Some(e.to_string()),
                });
                return;
            }
        };

        if !new_issues.is_empty() {
            logger.info(
                "found newly triggered issues",
                Some(serde_json::json!({"count": new_issues.len()})),
            );
        }

        for issue in new_issues {
            logger.info(
                "auto-invoking assistant",
                Some(serde_json::json!({"repo": issue.repo, "issue": issue.number})),
            );
            let status_tx = tx.clone();
            let mut on_status = move |number: u64, status: ExecutionStatus| {
                let _ = status_tx.send(AppEvent::Status(number, status));
            };
            let opts = logged_invoke_options(&log_dir, issue.number).await;
            // A failed invocation is already surfaced through the status
            // callback; keep processing the remaining issues
            if let Err(e) = invoker.invoke(&issue, None, opts, &mut on_status).await {
                logger.error(
                    "assistant invocation failed",
                    Some(serde_json::json!({"issue": issue.number, "error": e.to_string()})),
                );
            } else {
                logger.info(
                    "assistant invocation completed",
                    Some(serde_json::json!({"issue": issue.number})),
                );
            }
        }

        match watcher.list_assigned().await {
            Ok(issues) => {
                logger.info(
                    "refreshed assigned issues",
                    Some(serde_json::json!({"count": issues.len()})),
                );
                let _ = tx.send(AppEvent::PollFinished {
                    issues: Some(issues),
                    error: None,
                });
            }
            Err(e) => {
                logger.error(
                    "failed to refresh assigned issues",
                    Some(serde_json::json!({"error": e.to_string()})),
                );
                let _ = tx.send(AppEvent::PollFinished {
                    issues: None,
                    error: Some(e.to_string()),
                });
            }
        }
    });
}

/// Run one manually triggered invocation off the event loop.
fn spawn_manual_invoke(
    invoker: Arc<AssistantInvoker>,
    logger: Logger,
    log_dir: PathBuf,
    issue: Issue,
    custom_prompt: Option<String>,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        logger.info(
            "manual trigger",
            Some(serde_json::json!({
                "repo": issue.repo,
                "issue": issue.number,
                "custom_prompt": custom_prompt.is_some(),
            })),
        );
        let status_tx = tx.clone();
        let mut on_status = move |number: u64, status: ExecutionStatus| {
            let _ = status_tx.send(AppEvent::Status(number, status));
        };
        let opts = logged_invoke_options(&log_dir, issue.number).await;
        let result = invoker
            .invoke(&issue, custom_prompt.as_deref(), opts, &mut on_status)
            .await;

        let error = match result {
            Ok(()) => {
                logger.info(
                    "assistant invocation completed",
                    Some(serde_json::json!({"issue": issue.number})),
                );
                None
            }
            Err(e) => {
                logger.error(
                    "assistant invocation failed",
                    Some(serde_json::json!({"issue": issue.number, "error": e.to_string()})),
                );
                Some(format!("failed to invoke assistant: {}", e))
            }
        };
        let _ = tx.send(AppEvent::InvocationDone { error });
    });
}

/// Setup the terminal for TUI mode.
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend)
}

/// Restore the terminal to normal mode.
fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Run the dashboard until the user quits.
///
/// Performs the startup checks (gh present and authenticated) before
/// touching the terminal, so fatal configuration errors surface as plain
/// stderr messages.
pub async fn run_tui(config: Config) -> Result<()> {
    let logger = Logger::new(&config.log_dir());
    let github = GithubClient::new(&config, logger.clone());
    github.ensure_available().await?;
    let user = github.current_user().await.ok();

    let cache = EventCache::new(&config.cache_dir);
    let watcher = Arc::new(IssueWatcher::new(
        github,
        cache,
        &config.trigger_label,
        logger.clone(),
    ));
    let invoker = Arc::new(AssistantInvoker::new(&config));

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &config, watcher, invoker, logger, user).await;
    restore_terminal()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    watcher: Arc<IssueWatcher<GithubClient>>,
    invoker: Arc<AssistantInvoker>,
    logger: Logger,
    user: Option<String>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut app = App::new(&config.trigger_label, user);
    let log_dir = config.log_dir();

    // First tick fires immediately: the startup check, then every 60s
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        terminal.draw(|f| app.render(f))?;

        tokio::select! {
            _ = interval.tick() => {
                // Overlapping automatic polls are skipped, not queued
                if !app.poll_in_flight {
                    app.mark_poll_started();
                    spawn_poll(
                        Arc::clone(&watcher),
                        Arc::clone(&invoker),
                        logger.clone(),
                        log_dir.clone(),
                        tx.clone(),
                    );
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if event::poll(Duration::from_millis(0))? {
                    if let Event::Key(key) = event::read()? {
                        if key.kind == KeyEventKind::Press {
                            match app.handle_key(key.code, key.modifiers) {
                                Some(UserAction::Refresh) => {
                                    if !app.poll_in_flight {
                                        app.mark_poll_started();
                                        spawn_poll(
                                            Arc::clone(&watcher),
                                            Arc::clone(&invoker),
                                            logger.clone(),
                                            log_dir.clone(),
                                            tx.clone(),
                                        );
                                    }
                                }
                                Some(UserAction::Invoke(issue, custom)) => {
                                    spawn_manual_invoke(
                                        Arc::clone(&invoker),
                                        logger.clone(),
                                        log_dir.clone(),
                                        issue,
                                        custom,
                                        tx.clone(),
                                    );
                                }
                                None => {}
                            }
                        }
                    }
                }
            }
            Some(event) = rx.recv() => {
                app.apply_event(event);
            }
        }

        if app.should_quit {
            logger.info("application exit requested", None);
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(number: u64) -> Issue {
        Issue {
            number,
            title: format!("issue {}", number),
            state: "open".to_string(),
            labels: vec!["implement".to_string()],
            assignee: None,
            repo: "o/r".to_string(),
            url: format!("https://github.com/o/r/issues/{}", number),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn app_with_issues(numbers: &[u64]) -> App {
        let mut app = App::new("implement", None);
        app.issues = numbers.iter().map(|n| issue(*n)).collect();
        app
    }

    #[test]
    fn test_navigation_clamps_to_list() {
        let mut app = app_with_issues(&[1, 2]);
        app.handle_key(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(app.selected, 0);
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(app.selected, 1);
        app.handle_key(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(app.selected, 1);
        app.handle_key(KeyCode::Char('k'), KeyModifiers::NONE);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app_with_issues(&[]);
        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(app.should_quit);

        let mut app = app_with_issues(&[]);
        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }

    #[test]
    fn test_enter_opens_prompt_for_selected_issue() {
        let mut app = app_with_issues(&[1, 2]);
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(app.prompt.as_ref().map(|p| p.issue().number), Some(2));
    }

    #[test]
    fn test_enter_on_empty_list_is_noop() {
        let mut app = app_with_issues(&[]);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.prompt.is_none());
    }

    #[test]
    fn test_prompt_submit_resolves_to_invoke_action() {
        let mut app = app_with_issues(&[7]);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('g'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('o'), KeyModifiers::NONE);

        let action = app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        match action {
            Some(UserAction::Invoke(issue, custom)) => {
                assert_eq!(issue.number, 7);
                assert_eq!(custom.as_deref(), Some("go"));
            }
            _ => panic!("expected invoke action"),
        }
        assert!(app.prompt.is_none());
    }

    #[test]
    fn test_prompt_escape_cancels_without_action() {
        let mut app = app_with_issues(&[7]);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        let action = app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert!(action.is_none());
        assert!(app.prompt.is_none());
    }

    #[test]
    fn test_q_inside_prompt_is_text_not_quit() {
        let mut app = app_with_issues(&[7]);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_running_status_records_last_executed() {
        let mut app = app_with_issues(&[7]);
        app.apply_event(AppEvent::Status(7, ExecutionStatus::Running));
        let activity = app.activity.get(&7).unwrap();
        assert_eq!(activity.status, ExecutionStatus::Running);
        assert!(activity.last_executed.is_some());
    }

    #[test]
    fn test_error_status_sets_banner() {
        let mut app = app_with_issues(&[7]);
        app.apply_event(AppEvent::Status(7, ExecutionStatus::Error("boom".to_string())));
        assert_eq!(app.error.as_deref(), Some("boom"));
        assert_eq!(
            app.activity.get(&7).unwrap().status,
            ExecutionStatus::Error("boom".to_string())
        );
    }

    #[test]
    fn test_refresh_preserves_known_statuses() {
        let mut app = app_with_issues(&[7]);
        app.apply_event(AppEvent::Status(7, ExecutionStatus::Completed));
        app.apply_event(AppEvent::PollFinished {
            issues: Some(vec![issue(7), issue(8)]),
            error: None,
        });

        assert_eq!(app.issues.len(), 2);
        assert_eq!(
            app.activity.get(&7).unwrap().status,
            ExecutionStatus::Completed
        );
        // Issue 8 has no recorded activity: renders as idle
        assert!(app.activity.get(&8).is_none());
    }

    #[test]
    fn test_poll_finished_clears_in_flight_and_clamps_selection() {
        let mut app = app_with_issues(&[1, 2, 3]);
        app.selected = 2;
        app.mark_poll_started();
        assert!(app.poll_in_flight);
        assert!(app.loading);

        app.apply_event(AppEvent::PollFinished {
            issues: Some(vec![issue(1)]),
            error: None,
        });
        assert!(!app.poll_in_flight);
        assert!(!app.loading);
        assert_eq!(app.selected, 0);
        assert!(app.last_check.is_some());
    }

    #[test]
    fn test_poll_error_keeps_stale_list() {
        let mut app = app_with_issues(&[1, 2]);
        app.mark_poll_started();
        app.apply_event(AppEvent::PollFinished {
            issues: None,
            error: Some("network down".to_string()),
        });
        assert_eq!(app.issues.len(), 2);
        assert_eq!(app.error.as_deref(), Some("network down"));
    }

    #[test]
    fn test_mark_poll_started_clears_previous_banner() {
        let mut app = app_with_issues(&[]);
        app.error = Some("old error".to_string());
        app.mark_poll_started();
        assert!(app.error.is_none());
    }

    #[test]
    fn test_manual_invocation_failure_sets_banner() {
        let mut app = app_with_issues(&[]);
        app.apply_event(AppEvent::InvocationDone {
            error: Some("failed to invoke assistant: exit 1".to_string()),
        });
        assert!(app.error.as_deref().unwrap().contains("exit 1"));
    }
}
