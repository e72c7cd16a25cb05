//! Runtime configuration for Crowsnest.
//!
//! The configuration is built exactly once at startup from CLI flags (with
//! their environment fallbacks, resolved by clap) and then threaded by
//! reference into every component. Business logic never reads the
//! environment directly.
//!
//! Precedence per option: CLI flag > environment variable > default.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::{Error, Result};

/// Dotfile directory name under the user's home, used when no cache
/// directory is configured.
const DEFAULT_CACHE_DIR: &str = ".crowsnest";

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Label whose application triggers an invocation
    pub trigger_label: String,
    /// Directory holding the event cache and the logs subdirectory
    pub cache_dir: PathBuf,
    /// Repositories to watch ("owner/name"); empty means detect from cwd
    pub repos: Vec<String>,
    /// Explicit assistant executable, if configured
    pub assistant_path: Option<PathBuf>,
    /// Working directory for repo detection and assistant runs
    pub work_dir: PathBuf,
    /// Whether to wrap invocations in the sandbox launcher
    pub use_sandbox: bool,
    /// Sandbox policy file override
    pub sandbox_config: Option<PathBuf>,
    /// Home directory, passed to the sandbox launcher
    pub home_dir: PathBuf,
}

impl Config {
    /// Build the configuration from parsed CLI arguments.
    ///
    /// # Errors
    /// Fails when no home directory can be determined while one is needed
    /// for the default cache dir, or when the working directory is
    /// unresolvable.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| Error::InvalidConfig("could not determine home directory".into()))?;

        let cache_dir = cli
            .cache_dir
            .unwrap_or_else(|| home_dir.join(DEFAULT_CACHE_DIR));

        let work_dir = match cli.work_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        // --repo wins over CN_REPOS when both are given
        let repos = if cli.repos.is_empty() {
            cli.repos_env
        } else {
            cli.repos
        };

        Ok(Self {
            trigger_label: cli.trigger_label,
            cache_dir,
            repos,
            assistant_path: cli.assistant_path,
            work_dir,
            use_sandbox: cli.use_sandbox,
            sandbox_config: cli.sandbox_config,
            home_dir,
        })
    }

    /// Directory that date-named log files are appended to.
    pub fn log_dir(&self) -> PathBuf {
        self.cache_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config_from(args: &[&str]) -> Config {
        Config::from_cli(Cli::try_parse_from(args).unwrap()).unwrap()
    }

    #[test]
    fn test_default_cache_dir_under_home() {
        let config = config_from(&["cn"]);
        assert!(config.cache_dir.ends_with(DEFAULT_CACHE_DIR));
        assert_eq!(config.trigger_label, "implement");
    }

    #[test]
    fn test_explicit_cache_dir() {
        let config = config_from(&["cn", "-c", "/tmp/cn-cache"]);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cn-cache"));
    }

    #[test]
    fn test_log_dir_is_under_cache_dir() {
        let config = config_from(&["cn", "-c", "/tmp/cn-cache"]);
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/cn-cache/logs"));
    }

    #[test]
    fn test_work_dir_defaults_to_cwd() {
        let config = config_from(&["cn"]);
        assert_eq!(config.work_dir, std::env::current_dir().unwrap());
    }

    #[test]
    fn test_repo_flag_wins_over_env_list() {
        let cli = Cli::try_parse_from(["cn", "-R", "a/b", "--repos", "c/d,e/f"]).unwrap();
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.repos, vec!["a/b"]);
    }

    #[test]
    fn test_env_repo_list_used_when_no_flag() {
        let cli = Cli::try_parse_from(["cn", "--repos", "c/d,e/f"]).unwrap();
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.repos, vec!["c/d", "e/f"]);
    }
}
