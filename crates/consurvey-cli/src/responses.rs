//! # Responses Subcommand
//!
//! - `list` — Recent responses with their answer counts.
//! - `clear --yes` — Delete every response and answer. Assigned coupons are
//!   unlinked and stay in the inventory.

use anyhow::Result;
use clap::{Args, Subcommand};

use consurvey_client::SurveyClient;

/// Arguments for the `consurvey responses` subcommand.
#[derive(Args, Debug)]
pub struct ResponsesArgs {
    #[command(subcommand)]
    pub command: ResponsesCommand,
}

#[derive(Subcommand, Debug)]
pub enum ResponsesCommand {
    /// List responses, newest first.
    List {
        /// Maximum number of responses.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Delete all responses.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

/// Execute the responses subcommand.
pub async fn run_responses(args: &ResponsesArgs, client: &SurveyClient) -> Result<u8> {
    match args.command {
        ResponsesCommand::List { limit } => {
            let responses = client.admin().list_responses(limit).await?;
            for r in &responses {
                println!(
                    "{:<8} {} {:>3} answer(s)",
                    r.response.id.to_string(),
                    r.response.submitted_at.format("%Y-%m-%d %H:%M"),
                    r.answers.len()
                );
            }
            println!("{} response(s)", responses.len());
            Ok(0)
        }
        ResponsesCommand::Clear { yes } => {
            if !yes {
                eprintln!("Refusing to delete all responses without --yes");
                return Ok(1);
            }
            let cleared = client.admin().clear_responses().await?;
            println!(
                "Deleted {} response(s) and {} answer(s)",
                cleared.responses, cleared.answers
            );
            Ok(0)
        }
    }
}
