//! # GM Interest Subcommand
//!
//! - `list` — Volunteers sorted by name.
//! - `reprocess` — Rebuild volunteer records from stored contact answers.
//! - `remove-answers` — Delete the contact answers, keeping the records.

use anyhow::Result;
use clap::{Args, Subcommand};

use consurvey_client::SurveyClient;

/// Arguments for the `consurvey gm-interest` subcommand.
#[derive(Args, Debug)]
pub struct GmInterestArgs {
    #[command(subcommand)]
    pub command: GmInterestCommand,
}

#[derive(Subcommand, Debug)]
pub enum GmInterestCommand {
    /// List GM volunteers.
    List,
    /// Rebuild GM interest records from contact answers.
    Reprocess,
    /// Delete the GM contact answers from all responses.
    RemoveAnswers,
}

/// Execute the gm-interest subcommand.
pub async fn run_gm_interest(args: &GmInterestArgs, client: &SurveyClient) -> Result<u8> {
    match args.command {
        GmInterestCommand::List => {
            let rows = client.admin().gm_interest().await?;
            for row in &rows {
                let i = &row.interest;
                println!(
                    "{:<8} {} {} <{}>",
                    i.response_id.to_string(),
                    i.first_name,
                    i.last_name,
                    i.email
                );
            }
            println!("{} volunteer(s)", rows.len());
        }
        GmInterestCommand::Reprocess => {
            let report = client.admin().reprocess_gm_interest().await?;
            println!(
                "Processed {} response(s), skipped {} with blank contact details",
                report.processed, report.skipped
            );
        }
        GmInterestCommand::RemoveAnswers => {
            let deleted = client.admin().remove_contact_answers().await?;
            println!("Deleted {deleted} contact answer(s)");
        }
    }
    Ok(0)
}
