//! # Rating Analytics
//!
//! Rating distributions for the admin charts, plus the convention and
//! adventure lists derived from answers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::answer::Answer;
use crate::identity::ResponseId;
use crate::question::{QuestionOption, QuestionRole};
use crate::survey::{normalize_key, title_case, SurveyDefinition};

/// Number of answers that gave one rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RatingBucket {
    pub rating: u8,
    pub count: u64,
}

/// Zero-filled distribution of one rating question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RatingDistribution {
    pub buckets: Vec<RatingBucket>,
    pub total: u64,
    pub average: Option<f64>,
}

impl RatingDistribution {
    /// Tally raw answer values into buckets `1..=max`.
    ///
    /// Only values made entirely of ASCII digits count. Out-of-range
    /// numbers are dropped.
    pub fn tally<'a>(values: impl IntoIterator<Item = &'a str>, max: u8) -> Self {
        let mut counts = BTreeMap::new();
        for raw in values {
            let raw = raw.trim();
            if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(n) = raw.parse::<u8>() {
                if (1..=max).contains(&n) {
                    *counts.entry(n).or_insert(0u64) += 1;
                }
            }
        }
        Self::from_counts(&counts, max)
    }

    /// Build from pre-grouped `(rating, count)` pairs, filling gaps with zero.
    pub fn from_counts(counts: &BTreeMap<u8, u64>, max: u8) -> Self {
        let buckets: Vec<RatingBucket> = (1..=max)
            .map(|rating| RatingBucket {
                rating,
                count: counts.get(&rating).copied().unwrap_or(0),
            })
            .collect();
        let total: u64 = buckets.iter().map(|b| b.count).sum();
        let weighted: u64 = buckets.iter().map(|b| u64::from(b.rating) * b.count).sum();
        let average = (total > 0).then(|| weighted as f64 / total as f64);
        Self {
            buckets,
            total,
            average,
        }
    }
}

/// All rating distributions shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RatingSummary {
    /// Convention the summary was filtered to, if any.
    pub convention: Option<String>,
    pub gm_rating: RatingDistribution,
    pub adventure_rating: RatingDistribution,
    pub recommendation_rating: RatingDistribution,
}

/// Scale of the GM and adventure ratings.
pub const FIVE_POINT: u8 = 5;
/// Scale of the recommendation score.
pub const TEN_POINT: u8 = 10;

/// Optional convention restriction for analytics queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConventionFilter(Option<String>);

impl ConventionFilter {
    /// Parse a query parameter. Blank and `all` mean no filter.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self(None),
            Some(s) if s.eq_ignore_ascii_case("all") => Self(None),
            Some(s) => Self(Some(s.to_string())),
        }
    }

    /// The convention to filter on, if any.
    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Whether an answered convention value passes this filter.
    pub fn admits(&self, answered: &str) -> bool {
        match &self.0 {
            None => true,
            Some(want) => answered.trim().eq_ignore_ascii_case(want),
        }
    }
}

/// A convention that appears in the answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConventionSummary {
    /// Value to pass back as the `convention` filter.
    pub value: String,
    pub display: String,
    /// Whether the value matched a configured option.
    pub matched_option: bool,
}

/// Distinct conventions found in answers, matched to the configured options.
///
/// Matching uses [`normalize_key`] so `Gen-Con`, `gen_con` and `Gen Con`
/// all land on the same option. Results are sorted by display name.
pub fn convention_summaries<'a>(
    options: &[QuestionOption],
    answered: impl IntoIterator<Item = &'a str>,
) -> Vec<ConventionSummary> {
    let by_key: BTreeMap<String, &QuestionOption> = options
        .iter()
        .flat_map(|o| {
            [
                (normalize_key(&o.option_value), o),
                (normalize_key(&o.option_text), o),
            ]
        })
        .collect();

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for raw in answered {
        let raw = raw.trim();
        if raw.is_empty() || !seen.insert(raw.to_string()) {
            continue;
        }
        let summary = match by_key.get(&normalize_key(raw)) {
            Some(option) => ConventionSummary {
                value: raw.to_string(),
                display: option.option_text.clone(),
                matched_option: true,
            },
            None => ConventionSummary {
                value: raw.to_string(),
                display: title_case(raw),
                matched_option: false,
            },
        };
        out.push(summary);
    }
    out.sort_by(|a, b| {
        a.display
            .to_lowercase()
            .cmp(&b.display.to_lowercase())
            .then_with(|| a.value.cmp(&b.value))
    });
    out
}

/// Union of configured adventure names and answered ones.
///
/// Deduplicated case-insensitively, sorted case-insensitively.
pub fn adventure_names<'a>(
    options: &'a [QuestionOption],
    answered: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut by_lower: BTreeMap<String, String> = BTreeMap::new();
    let names = options
        .iter()
        .map(|o| o.option_text.as_str())
        .chain(answered);
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        by_lower
            .entry(name.to_lowercase())
            .or_insert_with(|| name.to_string());
    }
    by_lower.into_values().collect()
}

/// Rating distributions over `answers`, restricted to responses whose
/// convention answer passes `filter`.
///
/// With a filter set, responses without a convention answer are left out.
pub fn rating_summary(
    definition: &SurveyDefinition,
    answers: &[Answer],
    filter: &ConventionFilter,
) -> RatingSummary {
    let question_of = |role: QuestionRole| definition.question_by_role(role).map(|q| q.id);
    let convention = question_of(QuestionRole::Convention);

    let admitted: BTreeSet<ResponseId> = answers
        .iter()
        .filter(|a| Some(a.question_id) == convention)
        .filter(|a| {
            [a.answer_text.as_deref(), a.answer_value.as_deref()]
                .into_iter()
                .flatten()
                .any(|v| filter.admits(v))
        })
        .map(|a| a.response_id)
        .collect();
    let counts = |a: &Answer| filter.value().is_none() || admitted.contains(&a.response_id);

    let distribution = |role: QuestionRole, max: u8| {
        let id = question_of(role);
        RatingDistribution::tally(
            answers
                .iter()
                .filter(|a| id == Some(a.question_id) && counts(a))
                .filter_map(Answer::matching_value),
            max,
        )
    };

    RatingSummary {
        convention: filter.value().map(str::to_string),
        gm_rating: distribution(QuestionRole::GmRating, FIVE_POINT),
        adventure_rating: distribution(QuestionRole::AdventureRating, FIVE_POINT),
        recommendation_rating: distribution(QuestionRole::Recommendation, TEN_POINT),
    }
}
