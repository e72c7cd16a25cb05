//! CLI argument definitions for Crowsnest.

use std::path::PathBuf;

use clap::Parser;

/// Crowsnest - watch GitHub issues for a trigger label and dispatch a
/// coding assistant.
///
/// Polls issues assigned to you, auto-invokes the assistant when the
/// trigger label is newly applied, and shows a live dashboard.
#[derive(Parser, Debug)]
#[command(name = "cn")]
#[command(author, version, about = "Watch assigned GitHub issues and dispatch a coding assistant", long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (", env!("CN_GIT_COMMIT"), ", built ", env!("CN_BUILD_TIMESTAMP"), ")"
))]
pub struct Cli {
    /// Label whose application triggers an assistant invocation
    #[arg(short = 'l', long = "trigger-label", env = "CN_TRIGGER_LABEL", default_value = "implement")]
    pub trigger_label: String,

    /// Directory for the event cache and logs (default: ~/.crowsnest)
    #[arg(short = 'c', long = "cache-dir", env = "CN_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Repository to watch in owner/name form (repeatable).
    /// When omitted, the repository is detected from the working directory.
    #[arg(short = 'R', long = "repo", value_name = "OWNER/NAME")]
    pub repos: Vec<String>,

    /// Comma-separated repositories to watch (alternative to --repo)
    #[arg(long = "repos", env = "CN_REPOS", value_delimiter = ',', hide = true)]
    pub repos_env: Vec<String>,

    /// Path to the assistant executable
    #[arg(short = 'p', long = "assistant-path", env = "CLAUDE_PATH")]
    pub assistant_path: Option<PathBuf>,

    /// Working directory for repository detection and assistant runs
    #[arg(short = 'w', long = "work-dir", env = "CN_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Wrap assistant invocations in a sandbox-exec launcher
    #[arg(short = 's', long = "sandbox", env = "CN_SANDBOX")]
    pub use_sandbox: bool,

    /// Sandbox policy file (default: crowsnest.sb in the working directory)
    #[arg(long = "sandbox-config", env = "CN_SANDBOX_CONFIG")]
    pub sandbox_config: Option<PathBuf>,
}
