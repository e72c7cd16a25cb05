//! Assistant subprocess launcher.
//!
//! Builds the task prompt, resolves the assistant executable, optionally
//! wraps the command in a `sandbox-exec` launcher, and streams subprocess
//! output while reporting status transitions through a callback.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

use crate::config::Config;
use crate::models::{ExecutionStatus, Issue};
use crate::{Error, Result};

/// Fallback command name, resolved via PATH.
const DEFAULT_ASSISTANT: &str = "claude";

/// Default sandbox policy filename inside the working directory.
const DEFAULT_SANDBOX_POLICY: &str = "crowsnest.sb";

/// Output sink for one subprocess stream.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Per-call invocation options.
///
/// Every field is an override on top of the configured defaults; `None`
/// falls through to the [`Config`] the invoker was built with.
pub struct InvokeOptions<'a> {
    /// Working directory override
    pub work_dir: Option<&'a Path>,
    /// Assistant executable override
    pub assistant_path: Option<&'a Path>,
    /// Sandbox enablement override
    pub use_sandbox: Option<bool>,
    /// Sandbox policy file override
    pub sandbox_config: Option<&'a Path>,
    /// Sink for subprocess stdout (defaults to this process's stdout)
    pub stdout: Option<OutputSink>,
    /// Sink for subprocess stderr (defaults to this process's stderr)
    pub stderr: Option<OutputSink>,
}

impl Default for InvokeOptions<'_> {
    fn default() -> Self {
        Self {
            work_dir: None,
            assistant_path: None,
            use_sandbox: None,
            sandbox_config: None,
            stdout: None,
            stderr: None,
        }
    }
}

/// Launches the external coding assistant for one issue.
#[derive(Debug, Clone)]
pub struct AssistantInvoker {
    assistant_path: Option<PathBuf>,
    work_dir: PathBuf,
    use_sandbox: bool,
    sandbox_config: Option<PathBuf>,
    home_dir: PathBuf,
}

impl AssistantInvoker {
    pub fn new(config: &Config) -> Self {
        Self {
            assistant_path: config.assistant_path.clone(),
            work_dir: config.work_dir.clone(),
            use_sandbox: config.use_sandbox,
            sandbox_config: config.sandbox_config.clone(),
            home_dir: config.home_dir.clone(),
        }
    }

    /// Resolve the assistant executable: per-call override > configured
    /// path (which already folds in the CLAUDE_PATH environment fallback)
    /// > bare command name resolved via PATH.
    fn resolve_assistant(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.assistant_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSISTANT))
    }

    /// Generated task prompt embedding the issue's identity and the
    /// standing instruction to implement, commit, and open a PR.
    fn build_prompt(issue: &Issue) -> String {
        format!(
            "GitHub issue implementation task:\n\n\
             Repository: {repo}\n\
             Issue number: #{number}\n\
             Title: {title}\n\
             URL: {url}\n\
             Labels: {labels}\n\n\
             Review this issue and implement what it asks for. When the\n\
             implementation is done, commit with an appropriate message\n\
             and open a pull request.",
            repo = issue.repo,
            number = issue.number,
            title = issue.title,
            url = issue.url,
            labels = issue.labels.join(", "),
        )
    }

    /// Construct the program and argument vector for one invocation.
    fn build_command(
        &self,
        issue: &Issue,
        custom_prompt: Option<&str>,
        opts: &InvokeOptions<'_>,
    ) -> (PathBuf, Vec<String>) {
        let prompt = custom_prompt
            .map(str::to_string)
            .unwrap_or_else(|| Self::build_prompt(issue));
        let assistant = self.resolve_assistant(opts.assistant_path);
        let work_dir = opts.work_dir.unwrap_or(&self.work_dir);
        let use_sandbox = opts.use_sandbox.unwrap_or(self.use_sandbox);

        if use_sandbox {
            let policy = opts
                .sandbox_config
                .map(Path::to_path_buf)
                .or_else(|| self.sandbox_config.clone())
                .unwrap_or_else(|| work_dir.join(DEFAULT_SANDBOX_POLICY));
            let args = vec![
                "-f".to_string(),
                policy.display().to_string(),
                "-D".to_string(),
                format!("WORK_DIR={}", work_dir.display()),
                "-D".to_string(),
                format!("HOME_DIR={}", self.home_dir.display()),
                assistant.display().to_string(),
                "-p".to_string(),
                prompt,
            ];
            (PathBuf::from("sandbox-exec"), args)
        } else {
            (assistant, vec!["-p".to_string(), prompt])
        }
    }

    /// Launch the assistant for `issue` and wait for it to finish.
    ///
    /// Reports `Running` through the callback before the launch, then
    /// `Completed` on a zero exit or `Error` (with a message) on a
    /// non-zero exit or spawn failure. Failures also propagate to the
    /// caller, which decides how they surface; they never abort sibling
    /// invocations.
    pub async fn invoke(
        &self,
        issue: &Issue,
        custom_prompt: Option<&str>,
        mut opts: InvokeOptions<'_>,
        on_status: &mut (dyn FnMut(u64, ExecutionStatus) + Send),
    ) -> Result<()> {
        let (program, args) = self.build_command(issue, custom_prompt, &opts);
        let work_dir = opts.work_dir.unwrap_or(&self.work_dir).to_path_buf();

        on_status(issue.number, ExecutionStatus::Running);

        let spawned = Command::new(&program)
            .args(&args)
            .current_dir(&work_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let message = format!("failed to launch {}: {}", program.display(), e);
                on_status(issue.number, ExecutionStatus::Error(message.clone()));
                return Err(Error::InvocationFailed(message));
            }
        };

        let mut stdout_sink: OutputSink = opts
            .stdout
            .take()
            .unwrap_or_else(|| Box::new(tokio::io::stdout()));
        let mut stderr_sink: OutputSink = opts
            .stderr
            .take()
            .unwrap_or_else(|| Box::new(tokio::io::stderr()));

        let mut child_stdout = child.stdout.take();
        let mut child_stderr = child.stderr.take();

        let drain_out = async {
            if let Some(out) = child_stdout.as_mut() {
                let _ = tokio::io::copy(out, &mut stdout_sink).await;
                let _ = stdout_sink.flush().await;
            }
        };
        let drain_err = async {
            if let Some(err) = child_stderr.as_mut() {
                let _ = tokio::io::copy(err, &mut stderr_sink).await;
                let _ = stderr_sink.flush().await;
            }
        };

        let (status, (), ()) = tokio::join!(child.wait(), drain_out, drain_err);

        match status {
            Ok(status) if status.success() => {
                on_status(issue.number, ExecutionStatus::Completed);
                Ok(())
            }
            Ok(status) => {
                let message = format!("assistant exited with {}", status);
                on_status(issue.number, ExecutionStatus::Error(message.clone()));
                Err(Error::InvocationFailed(message))
            }
            Err(e) => {
                let message = format!("failed waiting for assistant: {}", e);
                on_status(issue.number, ExecutionStatus::Error(message.clone()));
                Err(Error::InvocationFailed(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn test_issue() -> Issue {
        Issue {
            number: 42,
            title: "Add retry logic".to_string(),
            state: "open".to_string(),
            labels: vec!["implement".to_string()],
            assignee: None,
            repo: "o/r".to_string(),
            url: "https://github.com/o/r/issues/42".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn invoker_from(args: &[&str]) -> AssistantInvoker {
        let config = Config::from_cli(Cli::try_parse_from(args).unwrap()).unwrap();
        AssistantInvoker::new(&config)
    }

    #[test]
    fn test_generated_prompt_embeds_issue_fields() {
        let prompt = AssistantInvoker::build_prompt(&test_issue());
        assert!(prompt.contains("o/r"));
        assert!(prompt.contains("#42"));
        assert!(prompt.contains("Add retry logic"));
        assert!(prompt.contains("https://github.com/o/r/issues/42"));
        assert!(prompt.contains("implement"));
        assert!(prompt.contains("pull request"));
    }

    #[test]
    fn test_custom_prompt_used_verbatim() {
        let invoker = invoker_from(&["cn"]);
        let (_, args) =
            invoker.build_command(&test_issue(), Some("just fix it"), &InvokeOptions::default());
        assert_eq!(args, vec!["-p", "just fix it"]);
    }

    #[test]
    fn test_assistant_resolution_priority() {
        let invoker = invoker_from(&["cn", "-p", "/opt/claude"]);
        // Per-call override wins
        assert_eq!(
            invoker.resolve_assistant(Some(Path::new("/call/claude"))),
            PathBuf::from("/call/claude")
        );
        // Configured path next
        assert_eq!(invoker.resolve_assistant(None), PathBuf::from("/opt/claude"));

        // Bare command fallback (built directly so an ambient CLAUDE_PATH
        // cannot leak into the assertion)
        let bare = AssistantInvoker {
            assistant_path: None,
            work_dir: PathBuf::from("/tmp"),
            use_sandbox: false,
            sandbox_config: None,
            home_dir: PathBuf::from("/home/tester"),
        };
        assert_eq!(bare.resolve_assistant(None), PathBuf::from(DEFAULT_ASSISTANT));
    }

    #[test]
    fn test_sandbox_wraps_command() {
        let invoker = invoker_from(&[
            "cn",
            "-s",
            "--sandbox-config",
            "/tmp/policy.sb",
            "-w",
            "/work",
            "-p",
            "/opt/claude",
        ]);
        let (program, args) =
            invoker.build_command(&test_issue(), None, &InvokeOptions::default());

        assert_eq!(program, PathBuf::from("sandbox-exec"));
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "/tmp/policy.sb");
        assert_eq!(args[2], "-D");
        assert_eq!(args[3], "WORK_DIR=/work");
        assert_eq!(args[4], "-D");
        assert!(args[5].starts_with("HOME_DIR="));
        assert_eq!(args[6], "/opt/claude");
        assert_eq!(args[7], "-p");
    }

    #[test]
    fn test_sandbox_default_policy_in_work_dir() {
        let invoker = invoker_from(&["cn", "-s", "-w", "/work"]);
        let (_, args) = invoker.build_command(&test_issue(), None, &InvokeOptions::default());
        assert_eq!(args[1], format!("/work/{}", DEFAULT_SANDBOX_POLICY));
    }

    #[tokio::test]
    async fn test_successful_invocation_reports_running_then_completed() {
        let invoker = invoker_from(&["cn", "-w", "/tmp"]);
        let mut statuses = Vec::new();

        let result = invoker
            .invoke(
                &test_issue(),
                None,
                InvokeOptions {
                    assistant_path: Some(Path::new("/bin/true")),
                    ..InvokeOptions::default()
                },
                &mut |number, status| statuses.push((number, status)),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(
            statuses,
            vec![(42, ExecutionStatus::Running), (42, ExecutionStatus::Completed)]
        );
    }

    #[tokio::test]
    async fn test_failing_invocation_reports_error_and_propagates() {
        let invoker = invoker_from(&["cn", "-w", "/tmp"]);
        let mut statuses = Vec::new();

        let result = invoker
            .invoke(
                &test_issue(),
                None,
                InvokeOptions {
                    assistant_path: Some(Path::new("/bin/false")),
                    ..InvokeOptions::default()
                },
                &mut |number, status| statuses.push((number, status)),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0], (42, ExecutionStatus::Running));
        assert!(matches!(statuses[1].1, ExecutionStatus::Error(_)));
    }

    #[tokio::test]
    async fn test_launch_failure_reports_error_and_propagates() {
        let invoker = invoker_from(&["cn", "-w", "/tmp"]);
        let mut statuses = Vec::new();

        let result = invoker
            .invoke(
                &test_issue(),
                None,
                InvokeOptions {
                    assistant_path: Some(Path::new("/nonexistent/assistant")),
                    ..InvokeOptions::default()
                },
                &mut |number, status| statuses.push((number, status)),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(statuses[0], (42, ExecutionStatus::Running));
        match &statuses[1].1 {
            ExecutionStatus::Error(message) => assert!(message.contains("failed to launch")),
            other => panic!("expected error status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_output_streamed_to_caller_sink() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink_path = dir.path().join("out.log");
        let sink = tokio::fs::File::create(&sink_path).await.unwrap();

        let invoker = invoker_from(&["cn", "-w", "/tmp"]);
        let mut statuses = Vec::new();

        // `echo` ignores the -p flag semantics and prints its arguments
        let result = invoker
            .invoke(
                &test_issue(),
                Some("hello-from-test"),
                InvokeOptions {
                    assistant_path: Some(Path::new("/bin/echo")),
                    stdout: Some(Box::new(sink)),
                    ..InvokeOptions::default()
                },
                &mut |number, status| statuses.push((number, status)),
            )
            .await;

        assert!(result.is_ok());
        let captured = std::fs::read_to_string(&sink_path).unwrap();
        assert!(captured.contains("hello-from-test"));
    }
}
