//! # Coupons Subcommand
//!
//! Coupon inventory management.
//!
//! - `import <file>` — Bulk-import codes, one per line. Blank lines and
//!   lines starting with `#` are ignored.
//! - `list` — Show codes with their effective status.
//! - `delete <id>` — Remove a code.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};

use consurvey_client::SurveyClient;
use consurvey_core::{CouponId, CouponStatus};

/// Arguments for the `consurvey coupons` subcommand.
#[derive(Args, Debug)]
pub struct CouponsArgs {
    #[command(subcommand)]
    pub command: CouponsCommand,
}

/// Coupon subcommands.
#[derive(Subcommand, Debug)]
pub enum CouponsCommand {
    /// Import codes from a file.
    Import {
        /// File with one code per line.
        file: PathBuf,
        /// Notes stored with every imported code.
        #[arg(long)]
        notes: Option<String>,
    },

    /// List codes.
    List {
        /// Only codes with this status (available, used, expired).
        #[arg(long)]
        status: Option<CouponStatus>,
    },

    /// Delete a code by id.
    Delete {
        /// Coupon id.
        id: i64,
    },
}

/// Execute the coupons subcommand.
///
/// `import` exits with 2 when some lines were rejected.
pub async fn run_coupons(args: &CouponsArgs, client: &SurveyClient) -> Result<u8> {
    match &args.command {
        CouponsCommand::Import { file, notes } => {
            let codes = read_codes(file)?;
            if codes.is_empty() {
                bail!("{} contains no codes", file.display());
            }
            let summary = client
                .admin()
                .import_coupons(&codes, notes.as_deref())
                .await
                .context("coupon import failed")?;

            println!(
                "Imported {} code(s), {} rejected",
                summary.created, summary.error_count
            );
            for err in &summary.errors {
                println!("  {}: {}", err.code, err.error);
            }
            Ok(if summary.error_count > 0 { 2 } else { 0 })
        }
        CouponsCommand::List { status } => {
            let coupons = client.admin().list_coupons(*status).await?;
            let now = Utc::now();
            println!(
                "{:<6} {:<24} {:<10} {:<9} EXPIRES",
                "ID", "CODE", "STATUS", "RESPONSE"
            );
            for c in &coupons {
                let response = c
                    .response_id
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<6} {:<24} {:<10} {:<9} {}",
                    c.id.to_string(),
                    c.code,
                    c.effective_status(now).as_str(),
                    response,
                    c.expires_at.format("%Y-%m-%d")
                );
            }
            println!("{} code(s)", coupons.len());
            Ok(0)
        }
        CouponsCommand::Delete { id } => {
            client.admin().delete_coupon(CouponId::new(*id)).await?;
            println!("Deleted coupon {id}");
            Ok(0)
        }
    }
}

/// Read codes from an import file.
pub fn read_codes(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}
