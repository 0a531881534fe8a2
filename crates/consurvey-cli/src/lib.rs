//! # consurvey-cli — Operator CLI for the Convention Survey Stack
//!
//! Provides the `consurvey` command-line interface. Every subcommand talks
//! to a running API through `consurvey-client`.
//!
//! ## Subcommands
//!
//! - `consurvey take` — Run the questionnaire on the terminal.
//! - `consurvey coupons` — Import, list and delete coupon codes.
//! - `consurvey export` — Download the CSV exports.
//! - `consurvey gm-interest` — List, rebuild or purge GM volunteer data.
//! - `consurvey ratings` — Rating distributions per convention.
//! - `consurvey responses` — List or clear stored responses.
//!
//! ```bash
//! consurvey coupons import codes.txt --notes "Gen Con batch"
//! consurvey take --convention gen-con
//! consurvey export responses --out responses.csv
//! ```

pub mod coupons;
pub mod export;
pub mod gm_interest;
pub mod ratings;
pub mod responses;
pub mod take;

use anyhow::{Context, Result};
use consurvey_client::{ClientConfig, SurveyClient};

/// Build a client for `api_url`, or from the environment when absent.
pub fn connect(api_url: Option<&str>) -> Result<SurveyClient> {
    let config = match api_url {
        Some(url) => ClientConfig::for_url(url),
        None => ClientConfig::from_env(),
    }
    .context("invalid API configuration")?;
    tracing::debug!(base_url = %config.base_url, "connecting to survey API");
    SurveyClient::new(config).context("failed to build HTTP client")
}
