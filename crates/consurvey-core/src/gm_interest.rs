//! GM volunteer contact records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::answer::Answer;
use crate::error::ValidationError;
use crate::identity::{GmInterestId, ResponseId};
use crate::question::{validate_email, QuestionRole};
use crate::survey::SurveyDefinition;

/// Contact details a respondent leaves when volunteering as a GM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GmContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl GmContact {
    /// Require both names and a well-formed email.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::MissingField("first_name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::MissingField("last_name"));
        }
        validate_email(&self.email)
    }

    /// Copy with surrounding whitespace removed.
    pub fn trimmed(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }

    /// Whether every field is blank.
    pub fn is_blank(&self) -> bool {
        self.first_name.trim().is_empty()
            && self.last_name.trim().is_empty()
            && self.email.trim().is_empty()
    }
}

/// A stored GM interest record, one per response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GmInterest {
    pub id: GmInterestId,
    pub response_id: ResponseId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A GM interest record joined with its response's submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GmInterestRow {
    #[serde(flatten)]
    pub interest: GmInterest,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Sort for the admin list: last name, then first name, case-insensitive.
pub fn sort_by_name(rows: &mut [GmInterestRow]) {
    rows.sort_by(|a, b| {
        let key = |r: &GmInterestRow| {
            (
                r.interest.last_name.to_lowercase(),
                r.interest.first_name.to_lowercase(),
            )
        };
        key(a).cmp(&key(b)).then(a.interest.id.cmp(&b.interest.id))
    });
}

/// Rebuild a contact from the answers to the contact-role questions.
///
/// Used to migrate contact details that were stored as plain answers.
/// Returns `None` when none of the three questions was answered.
pub fn contact_from_answers(definition: &SurveyDefinition, answers: &[Answer]) -> Option<GmContact> {
    let field = |role: QuestionRole| -> String {
        definition
            .question_by_role(role)
            .and_then(|q| answers.iter().find(|a| a.question_id == q.id))
            .and_then(|a| a.answer_text.as_deref().or(a.answer_value.as_deref()))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let contact = GmContact {
        first_name: field(QuestionRole::GmFirstName),
        last_name: field(QuestionRole::GmLastName),
        email: field(QuestionRole::GmEmail),
    };
    (!contact.is_blank()).then_some(contact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AnswerId;
    use crate::survey::default_survey;

    fn answer(def: &SurveyDefinition, role: QuestionRole, text: &str) -> Answer {
        Answer {
            id: AnswerId::new(1),
            response_id: ResponseId::new(1),
            question_id: def.question_by_role(role).unwrap().id,
            answer_text: Some(text.into()),
            answer_value: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn contact_validation() {
        let ok = GmContact {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
        };
        assert!(ok.validate().is_ok());

        let no_last = GmContact {
            last_name: " ".into(),
            ..ok.clone()
        };
        assert_eq!(no_last.validate(), Err(ValidationError::MissingField("last_name")));

        let bad_email = GmContact {
            email: "ada".into(),
            ..ok
        };
        assert!(matches!(bad_email.validate(), Err(ValidationError::InvalidEmail(_))));
    }

    #[test]
    fn contact_from_answers_reads_role_questions() {
        let def = default_survey();
        let answers = vec![
            answer(&def, QuestionRole::GmFirstName, " Ada "),
            answer(&def, QuestionRole::GmEmail, "ada@example.com"),
            answer(&def, QuestionRole::GmRating, "5"),
        ];
        let c = contact_from_answers(&def, &answers).unwrap();
        assert_eq!(c.first_name, "Ada");
        assert_eq!(c.last_name, "");
        assert_eq!(c.email, "ada@example.com");

        let none = vec![answer(&def, QuestionRole::GmRating, "5")];
        assert!(contact_from_answers(&def, &none).is_none());
    }

    #[test]
    fn sorts_by_last_then_first_name() {
        let row = |id: i64, first: &str, last: &str| GmInterestRow {
            interest: GmInterest {
                id: GmInterestId::new(id),
                response_id: ResponseId::new(id),
                first_name: first.into(),
                last_name: last.into(),
                email: "x@y.z".into(),
                created_at: Utc::now(),
            },
            submitted_at: None,
        };
        let mut rows = vec![row(1, "Zed", "adams"), row(2, "Amy", "Baker"), row(3, "Al", "Adams")];
        sort_by_name(&mut rows);
        let ids: Vec<i64> = rows.iter().map(|r| r.interest.id.get()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
