//! Crowsnest - a terminal lookout for GitHub issues.
//!
//! This library provides the core functionality for the `cn` CLI tool:
//! polling for issues assigned to the current user, deduplicating
//! trigger-label events, and dispatching a coding assistant subprocess.

pub mod cache;
pub mod cli;
pub mod config;
pub mod github;
pub mod invoker;
pub mod logger;
pub mod models;
pub mod tui;
pub mod watcher;

/// Library-level error type for Crowsnest operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GitHub CLI (gh) is not installed. Install it first: https://cli.github.com/")]
    GhNotInstalled,

    #[error("GitHub CLI is not authenticated. Run `gh auth login` first.")]
    GhNotAuthenticated,

    #[error("Not in a GitHub repository: {0}")]
    NoRepository(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Assistant invocation failed: {0}")]
    InvocationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Crowsnest operations.
pub type Result<T> = std::result::Result<T, Error>;
