//! `autoqa scenario` / `autoqa approve`: inspect the approved scenario
//! and approve a new one, either from the latest analysis or from a file.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use autoqa_client::{QaClient, ResourceKey};
use clap::Parser;
use serde_json::Value;

use crate::{fetch_snapshot, format};

#[derive(Debug, Parser)]
pub struct ScenarioArgs {
    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

pub async fn cmd_scenario(client: &QaClient, args: &ScenarioArgs) -> Result<()> {
    match client.approved_scenario().await? {
        Some(scenario) => {
            if args.json {
                println!("{}", format::to_json(&scenario));
            } else {
                let title = scenario
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("(untitled)");
                println!("approved scenario: {title}");
                println!("{}", format::to_json(&scenario));
            }
        }
        None => println!("no approved scenario"),
    }
    Ok(())
}

#[derive(Debug, Parser)]
pub struct ApproveArgs {
    /// Scenario JSON file; defaults to the latest analysis' proposal.
    #[arg(long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,
}

pub async fn cmd_approve(client: &QaClient, args: &ApproveArgs) -> Result<()> {
    let scenario: Value = match &args.file {
        Some(path) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => {
            let snapshot = fetch_snapshot(client.engine(), ResourceKey::LatestAnalysis).await?;
            let Some(analysis) = snapshot.analysis() else {
                bail!("no analysis available; run `autoqa analyze` first");
            };
            match &analysis.scenario {
                Some(scenario) => scenario.clone(),
                None => bail!("the latest analysis has no proposed scenario"),
            }
        }
    };

    client.actions().approve_scenario(&scenario).await?;

    let title = scenario
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("scenario");
    println!("approved: {title}");
    Ok(())
}
