//! # consurvey CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use consurvey_cli::coupons::{run_coupons, CouponsArgs};
use consurvey_cli::export::{run_export, ExportArgs};
use consurvey_cli::gm_interest::{run_gm_interest, GmInterestArgs};
use consurvey_cli::ratings::{run_ratings, RatingsArgs};
use consurvey_cli::responses::{run_responses, ResponsesArgs};
use consurvey_cli::take::{run_take, TakeArgs};

/// Convention survey CLI
///
/// Operator tooling for the survey API: coupon inventory, exports, GM
/// interest maintenance and rating reports, plus a terminal survey runner.
#[derive(Parser, Debug)]
#[command(name = "consurvey", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Base URL of the survey API.
    #[arg(long, global = true, env = "CONSURVEY_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Take the survey on the terminal.
    Take(TakeArgs),

    /// Coupon inventory (import, list, delete).
    Coupons(CouponsArgs),

    /// Download a CSV export.
    Export(ExportArgs),

    /// GM volunteer data maintenance.
    GmInterest(GmInterestArgs),

    /// Rating distributions, optionally for one convention.
    Ratings(RatingsArgs),

    /// Stored responses (list, clear).
    Responses(ResponsesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = consurvey_cli::connect(cli.api_url.as_deref()).and_then(|client| {
        runtime.block_on(async {
            match &cli.command {
                Commands::Take(args) => run_take(args, &client).await,
                Commands::Coupons(args) => run_coupons(args, &client).await,
                Commands::Export(args) => run_export(args, &client).await,
                Commands::GmInterest(args) => run_gm_interest(args, &client).await,
                Commands::Ratings(args) => run_ratings(args, &client).await,
                Commands::Responses(args) => run_responses(args, &client).await,
            }
        })
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
