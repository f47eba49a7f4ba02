//! `autoqa run` / `runs` / `reports` / `watch`: scenario execution and the
//! execution dashboards.

use anyhow::Result;
use autoqa_client::{QaClient, ResourceKey, RunOptions};
use clap::Parser;

use crate::{fetch_snapshot, format};

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Run with a visible browser window.
    #[arg(long = "headed")]
    pub headed: bool,

    /// Leave the browser open after the run finishes.
    #[arg(long = "keep-browser-open")]
    pub keep_browser_open: bool,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

pub async fn cmd_run(client: &QaClient, args: &RunArgs) -> Result<()> {
    let options = RunOptions {
        headless: !args.headed,
        keep_browser_open: args.keep_browser_open,
    };
    let started = client.actions().start_run(options).await?;

    if args.json {
        println!("{}", format::to_json(&started));
    } else {
        println!("{}", format::started_run(&started, client.config().base()));
    }
    Ok(())
}

#[derive(Debug, Parser)]
pub struct RunsArgs {
    /// Maximum number of runs to list.
    #[arg(long = "limit", default_value = "20")]
    pub limit: usize,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

pub async fn cmd_runs(client: &QaClient, args: &RunsArgs) -> Result<()> {
    let snapshot = fetch_snapshot(client.engine(), ResourceKey::Runs).await?;
    let runs = snapshot.runs().unwrap_or_default();
    let shown = &runs[..args.limit.min(runs.len())];

    if args.json {
        println!("{}", format::to_json(&shown));
    } else {
        // Metrics cover the full history; the listing honors --limit.
        println!("{}", format::run_summary(runs));
        if !shown.is_empty() {
            println!("{}", format::run_lines(shown));
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
pub struct ReportsArgs {
    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

pub async fn cmd_reports(client: &QaClient, args: &ReportsArgs) -> Result<()> {
    let snapshot = fetch_snapshot(client.engine(), ResourceKey::Reports).await?;
    let reports = snapshot.reports().unwrap_or_default();

    if args.json {
        println!("{}", format::to_json(&reports));
    } else if reports.is_empty() {
        println!("no reports yet");
    } else {
        println!("{}", format::report_lines(reports, client.config().base()));
    }
    Ok(())
}

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Poll interval in milliseconds (overrides config).
    #[arg(long = "interval-ms", value_name = "MS")]
    pub interval_ms: Option<u64>,
}

pub async fn cmd_watch(client: &QaClient) -> Result<()> {
    let engine = client.engine();
    let mut runs_rx = engine.subscribe(ResourceKey::Runs);
    let mut reports_rx = engine.subscribe(ResourceKey::Reports);
    let _poller = engine.start_polling(&[ResourceKey::Runs, ResourceKey::Reports]);

    println!(
        "watching {} every {}ms (Ctrl-C to stop)",
        client.config().base(),
        client.config().poll_interval.as_millis()
    );

    // Successful polls publish even when nothing changed; only re-render
    // when the rendered line actually differs.
    let mut last_runs_line = String::new();
    let mut last_reports_line = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = runs_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = runs_rx.borrow_and_update().clone();
                if let Some(error) = &snapshot.last_error {
                    eprintln!("refresh failed, keeping last data: {error}");
                }
                if let Some(runs) = snapshot.runs() {
                    let line = format::run_summary(runs);
                    if line != last_runs_line {
                        println!("{line}");
                        last_runs_line = line;
                    }
                }
            }
            changed = reports_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = reports_rx.borrow_and_update().clone();
                if let Some(reports) = snapshot.reports() {
                    let line = format::report_summary(reports);
                    if line != last_reports_line {
                        println!("{line}");
                        last_reports_line = line;
                    }
                }
            }
        }
    }

    println!("stopped");
    Ok(())
}
