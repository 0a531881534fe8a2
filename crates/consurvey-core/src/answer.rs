//! # Answers and Responses
//!
//! The raw answer a respondent gives, the flattened rows it is stored as,
//! and the stored response records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{AnswerId, QuestionId, ResponseId, SurveyId};
use crate::question::{validate_answer, Question, QuestionType};
use crate::survey::SurveyDefinition;

/// A respondent's answer to one question, as entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Choices(Vec<String>),
}

impl AnswerValue {
    /// Whether this counts as an answer for required-question checks.
    ///
    /// Blank strings and empty selections do not count.
    pub fn has_answer(&self) -> bool {
        match self {
            Self::Text(s) => !s.trim().is_empty(),
            Self::Choices(items) => !items.is_empty(),
            Self::Number(_) | Self::Bool(_) => true,
        }
    }

    /// The answer as a single string, if it is scalar.
    pub fn as_scalar(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(if *b { "yes".into() } else { "no".into() }),
            Self::Choices(_) => None,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for AnswerValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<bool> for AnswerValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// One answer row as sent over the wire and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnswerInput {
    pub question_id: QuestionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_value: Option<String>,
}

impl AnswerInput {
    /// The value used for matching: `answer_value` when set, else `answer_text`.
    pub fn matching_value(&self) -> Option<&str> {
        self.answer_value.as_deref().or(self.answer_text.as_deref())
    }

    /// Check this stored row against the question it answers.
    ///
    /// A multiple-choice row holds a single selected choice.
    pub fn validate_for(&self, question: &Question) -> Result<(), ValidationError> {
        let raw = self.matching_value().unwrap_or_default().to_string();
        let value = match question.question_type {
            QuestionType::MultipleChoice => AnswerValue::Choices(vec![raw]),
            _ => AnswerValue::Text(raw),
        };
        validate_answer(question, &value)
    }
}

/// Flatten entered answers into storable rows.
///
/// - free strings go to `answer_text`
/// - numbers and booleans go to `answer_value`
/// - a string or choice matching an option is stored with the option's
///   value in `answer_value` and its display text in `answer_text`
/// - each selected choice becomes its own row
///
/// Unanswered entries and questions unknown to `definition` are skipped.
pub fn expand_answers(
    definition: &SurveyDefinition,
    answers: &BTreeMap<QuestionId, AnswerValue>,
) -> Vec<AnswerInput> {
    let mut rows = Vec::new();
    for question in &definition.questions {
        let Some(value) = answers.get(&question.id) else {
            continue;
        };
        if !value.has_answer() {
            continue;
        }
        match value {
            AnswerValue::Text(s) => rows.push(match matched_option(question, s) {
                Some(row) => row,
                None => AnswerInput {
                    question_id: question.id,
                    answer_text: Some(s.trim().to_string()),
                    answer_value: None,
                },
            }),
            AnswerValue::Number(_) | AnswerValue::Bool(_) => rows.push(AnswerInput {
                question_id: question.id,
                answer_text: None,
                answer_value: value.as_scalar(),
            }),
            AnswerValue::Choices(items) => {
                for item in items {
                    rows.push(matched_option(question, item).unwrap_or_else(|| AnswerInput {
                        question_id: question.id,
                        answer_text: Some(item.clone()),
                        answer_value: Some(item.clone()),
                    }));
                }
            }
        }
    }
    rows
}

fn matched_option(question: &Question, raw: &str) -> Option<AnswerInput> {
    if !question.question_type.has_options() {
        return None;
    }
    question.option_matching(raw).map(|o| AnswerInput {
        question_id: question.id,
        answer_text: Some(o.option_text.clone()),
        answer_value: Some(o.option_value.clone()),
    })
}

/// Optional respondent identity attached at phase-one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RespondentInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A stored answer row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Answer {
    pub id: AnswerId,
    pub response_id: ResponseId,
    pub question_id: QuestionId,
    pub answer_text: Option<String>,
    pub answer_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Answer {
    /// The value used for matching: `answer_value` when set, else `answer_text`.
    pub fn matching_value(&self) -> Option<&str> {
        self.answer_value.as_deref().or(self.answer_text.as_deref())
    }
}

/// A stored survey response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SurveyResponse {
    pub id: ResponseId,
    pub survey_id: SurveyId,
    pub respondent_email: Option<String>,
    pub respondent_name: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
}

/// A response together with all of its answer rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResponseWithAnswers {
    #[serde(flatten)]
    pub response: SurveyResponse,
    pub answers: Vec<Answer>,
}
