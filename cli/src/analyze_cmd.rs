//! `autoqa analyze`: submit requirement text or a document for analysis
//! and render the resulting findings, quality scores and proposed
//! scenario.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use autoqa_client::{AnalyzeRequest, QaClient};
use clap::Parser;

use crate::format;

#[derive(Debug, Parser)]
pub struct AnalyzeArgs {
    /// Project identifier.
    #[arg(long = "project-id", value_name = "ID")]
    pub project_id: String,

    /// URL of the application under test.
    #[arg(long = "url", value_name = "URL")]
    pub url: String,

    /// Target type.
    #[arg(long = "target-type", default_value = "website")]
    pub target_type: String,

    /// Requirement text to analyze.
    #[arg(long = "text", conflicts_with = "file")]
    pub text: Option<String>,

    /// Requirement document to upload.
    #[arg(long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

pub async fn cmd_analyze(client: &QaClient, args: &AnalyzeArgs) -> Result<()> {
    let request =
        AnalyzeRequest::new(&args.project_id, &args.url).with_target_type(&args.target_type);

    let analysis = match (&args.text, &args.file) {
        (Some(text), None) => client.actions().analyze_text(&request, text).await?,
        (None, Some(path)) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            client
                .actions()
                .analyze_upload(&request, &file_name, bytes)
                .await?
        }
        _ => bail!("provide exactly one of --text or --file"),
    };

    if args.json {
        println!("{}", format::to_json(&analysis));
    } else {
        println!("{}", format::analysis_summary(&analysis));
    }
    Ok(())
}
