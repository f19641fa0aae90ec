//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap, one
//! subcommand per orchestration phase.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// NimFleet - fleet-wide NIM scan orchestrator for GitHub Actions
///
/// Dispatches a scan workflow across many repositories, waits for the
/// runs to finish, downloads their report artifacts, and merges the
/// per-repository reports into one fleet-wide summary.
///
/// Examples:
///   nimfleet trigger --config config/repos.toml
///   nimfleet trigger --specific-repos acme/widgets,acme/gadgets --dry-run
///   nimfleet collect --timeout 90 --poll-interval 15
///   nimfleet aggregate --markdown-output summary.md
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// GitHub token used for all remote calls
    ///
    /// Falls back to the BP_GITHUB_TOKEN environment variable when unset.
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output, no progress bars)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Trigger the scan workflow in each configured repository
    Trigger(TriggerArgs),
    /// Wait for triggered runs and download their report artifacts
    Collect(CollectArgs),
    /// Merge collected reports into one fleet-wide summary
    Aggregate(AggregateArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct TriggerArgs {
    /// Path to the repository targets file
    #[arg(long, default_value = "config/repos.toml", value_name = "FILE")]
    pub config: PathBuf,

    /// Output file for triggered run information
    #[arg(long, default_value = "triggered-runs.json", value_name = "FILE")]
    pub output: PathBuf,

    /// Print what would be done without actually triggering
    #[arg(long)]
    pub dry_run: bool,

    /// Specific repos to trigger, overriding the config (comma-separated)
    ///
    /// Example: --specific-repos acme/widgets,acme/gadgets
    #[arg(long, value_name = "REPOS", value_delimiter = ',')]
    pub specific_repos: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CollectArgs {
    /// Path to the triggered runs file
    #[arg(long, default_value = "triggered-runs.json", value_name = "FILE")]
    pub runs_file: PathBuf,

    /// Directory to store downloaded reports
    #[arg(long, default_value = "reports", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Timeout in minutes for waiting on workflow completion
    #[arg(long, default_value = "60", value_name = "MINUTES")]
    pub timeout: u64,

    /// Poll interval in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub poll_interval: u64,

    /// Skip waiting for workflows to complete
    #[arg(long)]
    pub skip_wait: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AggregateArgs {
    /// Directory containing repository scan reports
    #[arg(long, default_value = "reports", value_name = "DIR")]
    pub reports_dir: PathBuf,

    /// Output JSON file path
    #[arg(long, default_value = "aggregated-report.json", value_name = "FILE")]
    pub output: PathBuf,

    /// Optional Markdown output file path
    #[arg(long, value_name = "FILE")]
    pub markdown_output: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }
        Ok(())
    }

    /// Resolve the GitHub token from the CLI/env, with the secondary
    /// environment variable as fallback.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("BP_GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            command,
            token: Some("ghp_test".to_string()),
            verbose: false,
            quiet: false,
        }
    }

    fn trigger_command() -> Command {
        Command::Trigger(TriggerArgs {
            config: PathBuf::from("config/repos.toml"),
            output: PathBuf::from("triggered-runs.json"),
            dry_run: false,
            specific_repos: Vec::new(),
        })
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(trigger_command());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(trigger_command());
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_resolve_token_prefers_explicit() {
        let args = make_args(trigger_command());
        assert_eq!(args.resolve_token().as_deref(), Some("ghp_test"));
    }

    #[test]
    fn test_parse_trigger_with_specific_repos() {
        let args = Args::parse_from([
            "nimfleet",
            "trigger",
            "--token",
            "ghp_x",
            "--specific-repos",
            "acme/one,acme/two",
            "--dry-run",
        ]);

        match args.command {
            Command::Trigger(ref trigger) => {
                assert!(trigger.dry_run);
                assert_eq!(trigger.specific_repos, vec!["acme/one", "acme/two"]);
            }
            _ => panic!("expected trigger subcommand"),
        }
    }

    #[test]
    fn test_parse_collect_defaults() {
        let args = Args::parse_from(["nimfleet", "collect", "--token", "ghp_x"]);

        match args.command {
            Command::Collect(ref collect) => {
                assert_eq!(collect.timeout, 60);
                assert_eq!(collect.poll_interval, 30);
                assert!(!collect.skip_wait);
            }
            _ => panic!("expected collect subcommand"),
        }
    }
}
