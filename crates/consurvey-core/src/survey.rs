//! # Survey Definitions
//!
//! A survey together with its ordered questions, role lookups, pre-selected
//! convention resolution, and the stock convention survey used to seed new
//! deployments.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{OptionId, QuestionId, SurveyId};
use crate::question::{OptionAvailability, Question, QuestionOption, QuestionRole, QuestionType};

/// Survey metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A survey with its questions in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SurveyDefinition {
    pub survey: Survey,
    pub questions: Vec<Question>,
}

impl SurveyDefinition {
    /// Build a definition, sorting questions and their options by display order.
    pub fn new(survey: Survey, mut questions: Vec<Question>) -> Self {
        questions.sort_by_key(|q| (q.display_order, q.id));
        for q in &mut questions {
            q.options.sort_by_key(|o| (o.display_order, o.id));
        }
        Self { survey, questions }
    }

    /// Look up a question by id.
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Look up the question carrying `role`.
    pub fn question_by_role(&self, role: QuestionRole) -> Option<&Question> {
        self.questions.iter().find(|q| q.role == Some(role))
    }

    pub(crate) fn question_by_role_mut(&mut self, role: QuestionRole) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.role == Some(role))
    }

    /// Find an option of the `role` question by id.
    pub fn role_option(&self, role: QuestionRole, id: OptionId) -> Option<&QuestionOption> {
        self.question_by_role(role)?
            .options
            .iter()
            .find(|o| o.id == id)
    }

    /// Find an option of the `role` question by value or text.
    pub fn role_option_matching(&self, role: QuestionRole, raw: &str) -> Option<&QuestionOption> {
        self.question_by_role(role)?.option_matching(raw)
    }

    /// Ids of the GM contact questions.
    pub fn contact_question_ids(&self) -> Vec<QuestionId> {
        self.questions
            .iter()
            .filter(|q| q.role.is_some_and(QuestionRole::is_contact))
            .map(|q| q.id)
            .collect()
    }

    /// Resolve a pre-selected convention, typically from a URL parameter.
    ///
    /// Tries exact option value, exact option text, then partial containment
    /// in either direction, all case-insensitive. Falls back to an unmatched
    /// convention with a title-cased display name.
    pub fn resolve_convention(&self, raw: &str) -> Option<ConventionMatch> {
        let needle = raw.trim();
        if needle.is_empty() {
            return None;
        }
        let lowered = needle.to_lowercase();
        let options = self
            .question_by_role(QuestionRole::Convention)
            .map(|q| q.options.as_slice())
            .unwrap_or_default();

        let found = options
            .iter()
            .find(|o| o.option_value.to_lowercase() == lowered)
            .or_else(|| options.iter().find(|o| o.option_text.to_lowercase() == lowered))
            .or_else(|| {
                options.iter().find(|o| {
                    let value = o.option_value.to_lowercase();
                    let text = o.option_text.to_lowercase();
                    value.contains(&lowered)
                        || lowered.contains(&value)
                        || text.contains(&lowered)
                        || lowered.contains(&text)
                })
            });

        Some(match found {
            Some(option) => ConventionMatch {
                option_id: Some(option.id),
                value: option.option_value.clone(),
                display: option.option_text.clone(),
            },
            None => ConventionMatch {
                option_id: None,
                value: normalize_key(needle),
                display: title_case(needle),
            },
        })
    }
}

/// A pre-selected convention after resolution against the option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConventionMatch {
    /// The matched option, if any.
    pub option_id: Option<OptionId>,
    /// The value stored in the convention answer.
    pub value: String,
    /// Human-readable name.
    pub display: String,
}

/// Normalization key used to match free-form convention values.
///
/// Lowercases and collapses every run of `-`, `_`, and whitespace into `_`.
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Title-case a raw identifier: separators become spaces, each word capitalized.
pub fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Id of the stock survey.
pub const DEFAULT_SURVEY_ID: SurveyId = SurveyId::new(1);

/// The stock convention survey.
///
/// Ids are fixed so the in-memory store and the seed migration agree.
pub fn default_survey() -> SurveyDefinition {
    let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default();
    let survey = Survey {
        id: DEFAULT_SURVEY_ID,
        title: "Convention Play Survey".into(),
        description: Some("Tell us about the session you just played.".into()),
        is_active: true,
        settings: serde_json::json!({}),
        created_at: epoch,
        updated_at: epoch,
    };

    let layout: [(&str, QuestionType, bool, QuestionRole, serde_json::Value); 10] = [
        ("Which convention are you attending?", QuestionType::Dropdown, true, QuestionRole::Convention, serde_json::json!({})),
        ("Who was your GM?", QuestionType::Dropdown, true, QuestionRole::GameMaster, serde_json::json!({})),
        ("Which adventure did you play?", QuestionType::Dropdown, true, QuestionRole::Adventure, serde_json::json!({})),
        ("How would you rate your GM?", QuestionType::Rating, true, QuestionRole::GmRating, serde_json::json!({"min": 1, "max": 5})),
        ("How would you rate the adventure?", QuestionType::Rating, true, QuestionRole::AdventureRating, serde_json::json!({"min": 1, "max": 5})),
        ("On a scale of 1 to 10, how likely are you to recommend this game to a friend?", QuestionType::Rating, true, QuestionRole::Recommendation, serde_json::json!({"min": 1, "max": 10})),
        ("Would you like to learn more about becoming a GM?", QuestionType::YesNo, false, QuestionRole::GmInterest, serde_json::json!({})),
        ("First name", QuestionType::ShortText, true, QuestionRole::GmFirstName, serde_json::json!({})),
        ("Last name", QuestionType::ShortText, true, QuestionRole::GmLastName, serde_json::json!({})),
        ("Email address", QuestionType::Email, true, QuestionRole::GmEmail, serde_json::json!({})),
    ];

    let questions = layout
        .into_iter()
        .enumerate()
        .map(|(i, (text, question_type, is_required, role, rules))| {
            let id = QuestionId::new(i as i64 + 1);
            let options = if role == QuestionRole::Convention {
                DEFAULT_CONVENTIONS
                    .iter()
                    .enumerate()
                    .map(|(j, (text, value))| QuestionOption {
                        id: OptionId::new(j as i64 + 1),
                        question_id: id,
                        option_text: (*text).into(),
                        option_value: (*value).into(),
                        display_order: j as i32 + 1,
                    })
                    .collect()
            } else {
                Vec::new()
            };
            Question {
                id,
                survey_id: DEFAULT_SURVEY_ID,
                question_text: text.into(),
                question_type,
                is_required,
                display_order: i as i32 + 1,
                placeholder_text: None,
                validation_rules: rules,
                role: Some(role),
                options,
                availability: OptionAvailability::Unfiltered,
            }
        })
        .collect();

    SurveyDefinition::new(survey, questions)
}

/// Seed convention options as `(text, value)`.
pub const DEFAULT_CONVENTIONS: [(&str, &str); 4] = [
    ("Gen Con", "gen_con"),
    ("Origins Game Fair", "origins_game_fair"),
    ("PAX Unplugged", "pax_unplugged"),
    ("Dragon Con", "dragon_con"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_survey_has_one_question_per_role() {
        let def = default_survey();
        assert_eq!(def.questions.len(), 10);
        for role in QuestionRole::ALL {
            assert!(def.question_by_role(role).is_some(), "missing {role}");
        }
        assert_eq!(def.contact_question_ids().len(), 3);
    }

    #[test]
    fn resolve_convention_prefers_exact_value_then_text_then_partial() {
        let def = default_survey();

        let m = def.resolve_convention("GEN_CON").unwrap();
        assert_eq!(m.option_id, Some(OptionId::new(1)));
        assert_eq!(m.display, "Gen Con");

        let m = def.resolve_convention("origins game fair").unwrap();
        assert_eq!(m.value, "origins_game_fair");

        let m = def.resolve_convention("pax").unwrap();
        assert_eq!(m.value, "pax_unplugged");
    }

    #[test]
    fn resolve_convention_falls_back_to_title_case() {
        let def = default_survey();
        let m = def.resolve_convention("big-bad_con").unwrap();
        assert_eq!(m.option_id, None);
        assert_eq!(m.value, "big_bad_con");
        assert_eq!(m.display, "Big Bad Con");
        assert!(def.resolve_convention("  ").is_none());
    }

    #[test]
    fn normalize_key_collapses_separator_runs() {
        assert_eq!(normalize_key(" Gen-Con  2026 "), "gen_con_2026");
        assert_eq!(normalize_key("gen__con"), "gen_con");
        assert_eq!(normalize_key("--x--"), "x");
    }
}
