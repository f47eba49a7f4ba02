//! `autoqa` CLI entry point.
//!
//! Thin command-line surface over `autoqa_client`: each invocation builds
//! one [`QaClient`] from the layered config (file, env, then flags) and
//! talks to the backend through it. Logs go to stderr so stdout stays
//! parseable with `--json`.
//!
//! ## Commands
//!
//! - `autoqa health`
//! - `autoqa analyze --project-id <ID> --url <URL> (--text <TEXT> | --file <PATH>)`
//! - `autoqa scenario`
//! - `autoqa approve [--file <PATH>]`
//! - `autoqa run [--headed] [--keep-browser-open]`
//! - `autoqa runs [--limit <N>]`
//! - `autoqa reports`
//! - `autoqa watch [--interval-ms <MS>]`

mod analyze_cmd;
mod exec_cmd;
mod format;
mod scenario_cmd;

use std::time::Duration;

use anyhow::{Result, bail};
use autoqa_client::{ConfigLoader, QaClient, ResourceKey, Snapshot, SyncEngine};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::analyze_cmd::AnalyzeArgs;
use crate::exec_cmd::{ReportsArgs, RunArgs, RunsArgs, WatchArgs};
use crate::scenario_cmd::{ApproveArgs, ScenarioArgs};

#[derive(Debug, Parser)]
#[command(
    name = "autoqa",
    version,
    about = "Command-line client for the AutoQA backend"
)]
struct Cli {
    /// Backend base URL (overrides config).
    #[arg(long = "base-url", global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Per-request timeout in milliseconds (overrides config).
    #[arg(long = "timeout-ms", global = true, value_name = "MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the backend is reachable.
    Health(HealthArgs),
    /// Analyze requirement text or an uploaded document.
    Analyze(AnalyzeArgs),
    /// Show the currently approved scenario.
    Scenario(ScenarioArgs),
    /// Approve a scenario for execution.
    Approve(ApproveArgs),
    /// Execute the approved scenario.
    Run(RunArgs),
    /// List run history with the dashboard metrics.
    Runs(RunsArgs),
    /// List report artifacts.
    Reports(ReportsArgs),
    /// Poll runs and reports, re-rendering whenever something changes.
    Watch(WatchArgs),
}

#[derive(Debug, Parser)]
struct HealthArgs {
    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = build_client(&cli)?;

    match &cli.command {
        Command::Health(args) => cmd_health(&client, args).await,
        Command::Analyze(args) => analyze_cmd::cmd_analyze(&client, args).await,
        Command::Scenario(args) => scenario_cmd::cmd_scenario(&client, args).await,
        Command::Approve(args) => scenario_cmd::cmd_approve(&client, args).await,
        Command::Run(args) => exec_cmd::cmd_run(&client, args).await,
        Command::Runs(args) => exec_cmd::cmd_runs(&client, args).await,
        Command::Reports(args) => exec_cmd::cmd_reports(&client, args).await,
        Command::Watch(_) => exec_cmd::cmd_watch(&client).await,
    }
}

/// Layered config plus CLI overrides, then the client.
fn build_client(cli: &Cli) -> Result<QaClient> {
    let mut config = ConfigLoader::new().load()?;

    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.request_timeout = Duration::from_millis(timeout_ms);
    }
    if let Command::Watch(args) = &cli.command
        && let Some(interval_ms) = args.interval_ms
    {
        config.poll_interval = Duration::from_millis(interval_ms);
    }

    Ok(QaClient::new(config)?)
}

async fn cmd_health(client: &QaClient, args: &HealthArgs) -> Result<()> {
    let health = client.health().await?;

    if args.json {
        println!("{}", format::to_json(&health));
    } else {
        let status = health
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        println!("backend {status} at {}", client.config().base());
    }
    Ok(())
}

/// Refresh `key` and fail if nothing usable came back. A refresh failure
/// with cached data still renders, with a warning on stderr.
pub(crate) async fn fetch_snapshot(engine: &SyncEngine, key: ResourceKey) -> Result<Snapshot> {
    let snapshot = engine.refresh(key).await;
    if let Some(error) = &snapshot.last_error {
        if snapshot.is_empty() {
            bail!("{error}");
        }
        tracing::warn!("serving cached {key} data after refresh failure: {error}");
    }
    Ok(snapshot)
}
