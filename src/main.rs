//! NimFleet - fleet-wide NIM scan orchestrator for GitHub Actions
//!
//! A CLI tool that dispatches a scan workflow across many repositories,
//! polls the runs to completion, downloads their report artifacts, and
//! merges the per-repository reports into one fleet-wide summary.
//!
//! Exit codes:
//!   0 - Normal completion, including partial per-repository failures
//!   1 - Fatal precondition (missing token, missing config or runs file)

mod aggregate;
mod cli;
mod clock;
mod collect;
mod config;
mod dispatch;
mod github;
mod models;
mod poll;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{AggregateArgs, Args, CollectArgs, Command, TriggerArgs};
use clock::SystemClock;
use config::Config;
use github::GithubClient;
use models::{CollectionOutput, CollectionSummary, TriggerOutput};
use poll::PollOptions;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&args);

    info!("NimFleet v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = match args.command.clone() {
        Command::Trigger(trigger_args) => run_trigger(&args, trigger_args).await,
        Command::Collect(collect_args) => run_collect(&args, collect_args).await,
        Command::Aggregate(aggregate_args) => run_aggregate(aggregate_args),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Resolve the token and build the API client. Missing credentials are a
/// fatal startup error.
fn github_client(args: &Args) -> Result<GithubClient> {
    let token = args
        .resolve_token()
        .context("GITHUB_TOKEN or BP_GITHUB_TOKEN environment variable required")?;
    GithubClient::new(token).context("Failed to create GitHub client")
}

/// Run the trigger phase: dispatch every target, resolve run ids, write
/// the triggered-runs file.
async fn run_trigger(args: &Args, trigger_args: TriggerArgs) -> Result<()> {
    let client = github_client(args)?;

    println!("📋 Loading configuration...");
    let config = Config::load(&trigger_args.config)?;
    let targets = config.targets(&trigger_args.specific_repos);

    if targets.is_empty() {
        println!("No repositories to scan");
        return Ok(());
    }

    println!("Found {} repositories to scan", targets.len());
    if trigger_args.dry_run {
        println!("\n=== DRY RUN MODE ===\n");
    }

    let trigger_time = Utc::now();

    println!("\n🚀 Triggering workflows...");
    let mut records = dispatch::trigger_all(&client, &targets, trigger_args.dry_run).await;

    if !trigger_args.dry_run {
        println!("\nFetching run IDs...");
        dispatch::resolve_run_ids(&client, &SystemClock, &mut records, trigger_time).await;
    }

    let output = TriggerOutput::from_records(trigger_time, trigger_args.dry_run, records);
    write_json(&trigger_args.output, &output)?;

    println!("\n📊 Results written to: {}", trigger_args.output.display());
    println!("   Total: {}", output.total_repos);
    println!("   Triggered: {}", output.triggered);
    println!("   Failed: {}", output.failed);

    Ok(())
}

/// Run the collect phase: poll runs to completion, then download and
/// extract report artifacts.
async fn run_collect(args: &Args, collect_args: CollectArgs) -> Result<()> {
    let client = github_client(args)?;

    println!("📋 Loading triggered runs...");
    let content = std::fs::read_to_string(&collect_args.runs_file)
        .with_context(|| format!("Runs file not found: {}", collect_args.runs_file.display()))?;
    let runs_data: TriggerOutput = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse runs file: {}", collect_args.runs_file.display()))?;

    if !runs_data.is_collectable() {
        if runs_data.dry_run {
            println!("Runs file is from a dry run, nothing to collect");
        } else {
            println!("No runs to collect");
        }
        return Ok(());
    }

    let mut records = runs_data.runs;

    if !collect_args.skip_wait {
        println!("\n⏳ Waiting for workflow completion...");
        let options = PollOptions {
            timeout: Duration::from_secs(collect_args.timeout * 60),
            poll_interval: Duration::from_secs(collect_args.poll_interval),
            show_progress: !args.quiet,
        };
        poll::wait_for_completion(&client, &SystemClock, &mut records, &options).await;
    }

    println!("\n📥 Collecting reports...");
    std::fs::create_dir_all(&collect_args.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            collect_args.output_dir.display()
        )
    })?;

    let results = collect::collect_all(&client, &records, &collect_args.output_dir).await;
    let summary = CollectionSummary::from_results(&results);

    println!("\n📊 Collection complete:");
    println!("   Collected: {}", summary.collected);
    println!("   Partial: {}", summary.partial);
    println!("   Failed/Skipped: {}", summary.failed);

    let output = CollectionOutput {
        collection_time: Utc::now(),
        output_dir: collect_args.output_dir.to_string_lossy().into_owned(),
        results,
        summary,
    };

    let results_file = collect_args.output_dir.join("collection-results.json");
    write_json(&results_file, &output)?;
    println!("\nResults written to: {}", results_file.display());

    Ok(())
}

/// Run the aggregate phase: load collected reports and write the merged
/// summary. Needs no credentials.
fn run_aggregate(aggregate_args: AggregateArgs) -> Result<()> {
    println!("📋 Loading repository reports...");
    let reports = aggregate::load_reports(&aggregate_args.reports_dir);
    println!("Loaded {} reports", reports.len());

    println!("Aggregating statistics...");
    let aggregated = aggregate::aggregate(&reports, Utc::now());

    write_json(&aggregate_args.output, &aggregated)?;
    println!(
        "\n📊 Aggregated report written to: {}",
        aggregate_args.output.display()
    );

    println!("\n=== Summary ===");
    println!("Total repositories: {}", aggregated.metadata.total_repos);
    println!("\nBy Support Type:");
    for (support_type, count) in &aggregated.summary.by_support_type {
        println!("  {}: {}", support_type, count);
    }
    println!("\nBy Actions Usage:");
    for (usage_type, count) in &aggregated.summary.by_actions_usage {
        println!("  {}: {}", usage_type, count);
    }

    if let Some(ref markdown_path) = aggregate_args.markdown_output {
        let markdown = report::generate_markdown_report(&aggregated);
        std::fs::write(markdown_path, markdown).with_context(|| {
            format!("Failed to write Markdown report to {}", markdown_path.display())
        })?;
        println!("\nMarkdown report written to: {}", markdown_path.display());
    }

    Ok(())
}

/// Serialize a value as pretty JSON and write it to the given path.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
