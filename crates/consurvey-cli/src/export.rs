//! # Export Subcommand
//!
//! Downloads a CSV export to a file, or to stdout when `--out` is absent.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use consurvey_client::SurveyClient;

/// Which export to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    /// One row per response, one column per question.
    Responses,
    /// GM volunteer contacts.
    GmInterest,
}

/// Arguments for the `consurvey export` subcommand.
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(value_enum)]
    pub kind: ExportKind,

    /// Write to this file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Execute the export subcommand.
pub async fn run_export(args: &ExportArgs, client: &SurveyClient) -> Result<u8> {
    let csv = match args.kind {
        ExportKind::Responses => client.admin().export_responses_csv().await?,
        ExportKind::GmInterest => client.admin().export_gm_interest_csv().await?,
    };

    match &args.out {
        Some(path) => {
            std::fs::write(path, &csv)
                .with_context(|| format!("failed to write {}", path.display()))?;
            let rows = csv.lines().count().saturating_sub(1);
            println!("Wrote {rows} row(s) to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(csv.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(0)
}
