//! # Questions and Options
//!
//! Question types, semantic roles, dropdown options, and per-type answer
//! validation.
//!
//! Roles tag the handful of questions the rest of the system needs to find
//! (the convention dropdown, the GM contact fields, the rating questions).
//! Nothing else keys off question text or display order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::answer::AnswerValue;
use crate::error::ValidationError;
use crate::identity::{OptionId, QuestionId, SurveyId};

/// The input widget a question is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    LongText,
    MultipleChoice,
    SingleChoice,
    Dropdown,
    Rating,
    YesNo,
    Email,
    Number,
    Date,
}

impl QuestionType {
    /// All question types, in declaration order.
    pub const ALL: [QuestionType; 10] = [
        Self::ShortText,
        Self::LongText,
        Self::MultipleChoice,
        Self::SingleChoice,
        Self::Dropdown,
        Self::Rating,
        Self::YesNo,
        Self::Email,
        Self::Number,
        Self::Date,
    ];

    /// Database/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortText => "short_text",
            Self::LongText => "long_text",
            Self::MultipleChoice => "multiple_choice",
            Self::SingleChoice => "single_choice",
            Self::Dropdown => "dropdown",
            Self::Rating => "rating",
            Self::YesNo => "yes_no",
            Self::Email => "email",
            Self::Number => "number",
            Self::Date => "date",
        }
    }

    /// Whether questions of this type carry a list of options.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            Self::MultipleChoice | Self::SingleChoice | Self::Dropdown
        )
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownQuestionType(s.to_string()))
    }
}

/// Semantic tag identifying what a question is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum QuestionRole {
    Convention,
    GameMaster,
    Adventure,
    GmRating,
    AdventureRating,
    Recommendation,
    GmInterest,
    GmFirstName,
    GmLastName,
    GmEmail,
}

impl QuestionRole {
    /// All roles, in declaration order.
    pub const ALL: [QuestionRole; 10] = [
        Self::Convention,
        Self::GameMaster,
        Self::Adventure,
        Self::GmRating,
        Self::AdventureRating,
        Self::Recommendation,
        Self::GmInterest,
        Self::GmFirstName,
        Self::GmLastName,
        Self::GmEmail,
    ];

    /// The roles of the GM volunteer contact questions.
    pub const CONTACT: [QuestionRole; 3] = [Self::GmFirstName, Self::GmLastName, Self::GmEmail];

    /// Database/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Convention => "convention",
            Self::GameMaster => "game_master",
            Self::Adventure => "adventure",
            Self::GmRating => "gm_rating",
            Self::AdventureRating => "adventure_rating",
            Self::Recommendation => "recommendation",
            Self::GmInterest => "gm_interest",
            Self::GmFirstName => "gm_first_name",
            Self::GmLastName => "gm_last_name",
            Self::GmEmail => "gm_email",
        }
    }

    /// Whether this role collects GM volunteer contact details.
    pub fn is_contact(self) -> bool {
        Self::CONTACT.contains(&self)
    }
}

impl std::fmt::Display for QuestionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownQuestionRole(s.to_string()))
    }
}

/// How a question's option list relates to the current selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum OptionAvailability {
    /// The full option list, nothing selected upstream.
    #[default]
    Unfiltered,
    /// Narrowed to the assignments of the upstream selection.
    Filtered,
    /// The upstream selection has no assignments. The list is empty and
    /// should render as a disabled placeholder.
    Unassigned,
}

/// A selectable option of a choice or dropdown question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuestionOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    /// Display text. Editable.
    pub option_text: String,
    /// Stable machine value stored in answers. Never changes after creation.
    pub option_value: String,
    pub display_order: i32,
}

impl QuestionOption {
    /// Case-insensitive match against the option's value or text.
    pub fn matches(&self, raw: &str) -> bool {
        let raw = raw.trim();
        self.option_value.eq_ignore_ascii_case(raw) || self.option_text.eq_ignore_ascii_case(raw)
    }
}

/// A survey question along with its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Question {
    pub id: QuestionId,
    pub survey_id: SurveyId,
    pub question_text: String,
    pub question_type: QuestionType,
    pub is_required: bool,
    pub display_order: i32,
    #[serde(default)]
    pub placeholder_text: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub validation_rules: serde_json::Value,
    #[serde(default)]
    pub role: Option<QuestionRole>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub availability: OptionAvailability,
}

impl Question {
    /// Whether the flow must refuse to move past this question unanswered.
    ///
    /// A required dropdown whose upstream selection has no assignments
    /// cannot be answered, so it does not block.
    pub fn requires_answer(&self) -> bool {
        self.is_required && self.availability != OptionAvailability::Unassigned
    }

    /// Find the option whose value (preferred) or text matches `raw`.
    pub fn option_matching(&self, raw: &str) -> Option<&QuestionOption> {
        let raw = raw.trim();
        self.options
            .iter()
            .find(|o| o.option_value.eq_ignore_ascii_case(raw))
            .or_else(|| self.options.iter().find(|o| o.option_text.eq_ignore_ascii_case(raw)))
    }

    /// Inclusive bounds accepted by a rating question.
    pub fn rating_bounds(&self) -> (i64, i64) {
        let default_max = if self.role == Some(QuestionRole::Recommendation) {
            10
        } else {
            5
        };
        let min = self
            .validation_rules
            .get("min")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(1);
        let max = self
            .validation_rules
            .get("max")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(default_max);
        (min, max)
    }
}

/// Derive the stable `option_value` for a new option.
///
/// Lowercases the trimmed text and replaces each whitespace run with `_`.
pub fn option_value_for(text: &str) -> Result<String, ValidationError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Err(ValidationError::EmptyOptionText);
    }
    Ok(words.join("_").to_lowercase())
}

/// Check that `value` is an acceptable answer to `question`.
pub fn validate_answer(question: &Question, value: &AnswerValue) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidAnswer {
        question: question.id,
        reason,
    };

    match question.question_type {
        QuestionType::ShortText | QuestionType::LongText => match value {
            AnswerValue::Text(_) | AnswerValue::Number(_) => Ok(()),
            _ => Err(invalid("expected text".into())),
        },
        QuestionType::YesNo => match value {
            AnswerValue::Bool(_) => Ok(()),
            AnswerValue::Text(s) if is_yes(s) || s.trim().eq_ignore_ascii_case("no") => Ok(()),
            _ => Err(invalid("expected \"yes\" or \"no\"".into())),
        },
        QuestionType::Rating => {
            let (min, max) = question.rating_bounds();
            let n = match value {
                AnswerValue::Number(n) => n.as_i64(),
                AnswerValue::Text(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| invalid("expected a whole number".into()))?;
            if (min..=max).contains(&n) {
                Ok(())
            } else {
                Err(invalid(format!("rating must be between {min} and {max}")))
            }
        }
        QuestionType::Email => match value {
            AnswerValue::Text(s) => {
                validate_email(s)?;
                Ok(())
            }
            _ => Err(invalid("expected an email address".into())),
        },
        QuestionType::Number => match value {
            AnswerValue::Number(_) => Ok(()),
            AnswerValue::Text(s) if s.trim().parse::<f64>().is_ok() => Ok(()),
            _ => Err(invalid("expected a number".into())),
        },
        QuestionType::Date => match value {
            AnswerValue::Text(s) if NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").is_ok() => {
                Ok(())
            }
            _ => Err(invalid("expected a date as YYYY-MM-DD".into())),
        },
        QuestionType::SingleChoice | QuestionType::Dropdown => match value {
            AnswerValue::Text(s) => {
                if question.options.is_empty() || question.option_matching(s).is_some() {
                    Ok(())
                } else {
                    Err(invalid(format!("{s:?} is not one of the options")))
                }
            }
            _ => Err(invalid("expected a single option".into())),
        },
        QuestionType::MultipleChoice => match value {
            AnswerValue::Choices(items) => {
                if question.options.is_empty() {
                    return Ok(());
                }
                match items.iter().find(|v| question.option_matching(v).is_none()) {
                    Some(bad) => Err(invalid(format!("{bad:?} is not one of the options"))),
                    None => Ok(()),
                }
            }
            _ => Err(invalid("expected a list of options".into())),
        },
    }
}

/// Minimal structural email check: `local@domain`, both parts non-empty.
pub fn validate_email(raw: &str) -> Result<(), ValidationError> {
    let trimmed = raw.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(ValidationError::InvalidEmail(raw.to_string())),
    }
}

pub(crate) fn is_yes(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("yes")
}
