//! # Ratings Subcommand
//!
//! Prints the GM, adventure and recommendation distributions as text bars,
//! or the raw summary with `--json`.

use anyhow::Result;
use clap::Args;

use consurvey_client::SurveyClient;
use consurvey_core::RatingDistribution;

/// Widest bar drawn for the most common rating.
const BAR_WIDTH: u64 = 40;

/// Arguments for the `consurvey ratings` subcommand.
#[derive(Args, Debug)]
pub struct RatingsArgs {
    /// Only responses from this convention (value or display name).
    #[arg(long)]
    pub convention: Option<String>,

    /// List the conventions found in responses instead.
    #[arg(long, conflicts_with = "convention")]
    pub conventions: bool,

    /// Print JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the ratings subcommand.
pub async fn run_ratings(args: &RatingsArgs, client: &SurveyClient) -> Result<u8> {
    if args.conventions {
        let conventions = client.admin().conventions().await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&conventions)?);
        } else {
            for c in &conventions {
                let marker = if c.matched_option { "" } else { " (unlisted)" };
                println!("{:<24} {}{marker}", c.value, c.display);
            }
        }
        return Ok(0);
    }

    let summary = client.admin().ratings(args.convention.as_deref()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(0);
    }

    if let Some(convention) = &summary.convention {
        println!("Convention: {convention}");
    }
    for (title, dist) in [
        ("GM rating", &summary.gm_rating),
        ("Adventure rating", &summary.adventure_rating),
        ("Recommendation", &summary.recommendation_rating),
    ] {
        println!();
        print!("{}", render_distribution(title, dist));
    }
    Ok(0)
}

/// Text rendering of one distribution.
pub fn render_distribution(title: &str, dist: &RatingDistribution) -> String {
    let average = dist
        .average
        .map(|a| format!("{a:.2}"))
        .unwrap_or_else(|| "-".into());
    let mut text = format!("{title} (n={}, avg {average})\n", dist.total);
    let peak = dist.buckets.iter().map(|b| b.count).max().unwrap_or(0);
    for bucket in &dist.buckets {
        let len = if peak == 0 {
            0
        } else {
            bucket.count * BAR_WIDTH / peak
        };
        text.push_str(&format!(
            "{:>3} | {:<width$} {}\n",
            bucket.rating,
            "#".repeat(len as usize),
            bucket.count,
            width = BAR_WIDTH as usize
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use consurvey_core::analytics::RatingBucket;

    #[test]
    fn bars_scale_to_the_peak() {
        let dist = RatingDistribution {
            buckets: vec![
                RatingBucket { rating: 1, count: 0 },
                RatingBucket { rating: 2, count: 2 },
                RatingBucket { rating: 3, count: 4 },
            ],
            total: 6,
            average: Some(2.666),
        };
        let text = render_distribution("GM rating", &dist);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "GM rating (n=6, avg 2.67)");
        assert!(lines[2].contains(&"#".repeat(20)));
        assert!(!lines[2].contains(&"#".repeat(21)));
        assert!(lines[3].contains(&"#".repeat(40)));
    }

    #[test]
    fn empty_distribution_draws_no_bars() {
        let dist = RatingDistribution {
            buckets: (1..=5).map(|rating| RatingBucket { rating, count: 0 }).collect(),
            total: 0,
            average: None,
        };
        let text = render_distribution("Adventure rating", &dist);
        assert!(text.starts_with("Adventure rating (n=0, avg -)"));
        assert!(!text.contains('#'));
    }
}
