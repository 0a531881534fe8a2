//! # Persistence Backends
//!
//! [`SurveyStore`] is the single persistence seam of the API. It is either an
//! in-memory store (development, tests, and deployments without
//! `DATABASE_URL`) or a Postgres pool. Every operation dispatches to the
//! matching backend; rules that do not depend on the backend (role checks,
//! slugging, reprocessing) run here once, before dispatch.
//!
//! Both backends enforce the same constraints themselves as well: the
//! in-memory store under its write lock, Postgres through its schema.

pub mod memory;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use utoipa::ToSchema;

use consurvey_core::gm_interest::contact_from_answers;
use consurvey_core::question::option_value_for;
use consurvey_core::{
    Answer, AnswerInput, AssignmentId, AssociationError, AssociationIndex, CouponCode, CouponDelivery,
    CouponError, CouponId, CouponStatus, GmAdventure, GmContact, GmConvention, GmInterest,
    GmInterestRow, ImportReport, MarkAction, OptionId, Question, QuestionId, QuestionOption,
    QuestionRole, RespondentInfo, ResponseId, ResponseWithAnswers, SurveyDefinition, SurveyId,
    ValidationError,
};

use crate::db;

pub use memory::MemoryStore;

/// Errors from either backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// The write references rows that do not fit together.
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Association(#[from] AssociationError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Replace the message of a [`StoreError::Conflict`] with a readable one.
    fn conflict_as(self, message: impl FnOnce() -> String) -> Self {
        match self {
            Self::Conflict(_) => Self::Conflict(message()),
            other => other,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    return Self::Conflict(db_err.message().to_string())
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return Self::Invalid(db_err.message().to_string())
                }
                _ => {}
            }
        }
        Self::Database(err)
    }
}

/// A phase-one submission.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub survey_id: SurveyId,
    pub respondent: RespondentInfo,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub answers: Vec<AnswerInput>,
}

/// A coupon delivery to record.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub response_id: ResponseId,
    pub coupon_code: String,
    pub email_address: Option<String>,
    pub email_sent: bool,
}

/// Row counts removed by a clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClearedResponses {
    pub answers: u64,
    pub responses: u64,
}

/// Result of rebuilding GM interest records from answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReprocessReport {
    /// Responses whose GM interest record was written.
    pub processed: u64,
    /// Responses whose contact answers were all blank.
    pub skipped: u64,
}

/// Totals exported as Prometheus gauges.
#[derive(Debug, Clone, Default)]
pub struct StoreCounts {
    pub responses: u64,
    pub coupons_by_status: HashMap<CouponStatus, u64>,
}

/// The persistence backend.
#[derive(Debug, Clone)]
pub enum SurveyStore {
    Memory(MemoryStore),
    Postgres(PgPool),
}

impl SurveyStore {
    /// A fresh in-memory store seeded with the default survey.
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::seeded())
    }

    /// The Postgres pool, when running against a database.
    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Self::Memory(_) => None,
            Self::Postgres(pool) => Some(pool),
        }
    }

    /// Check that the backend can serve queries.
    pub async fn ping(&self) -> Result<(), StoreError> {
        if let Self::Postgres(pool) = self {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }

    // -- Surveys and options ------------------------------------------------

    /// A survey with all its questions and options.
    pub async fn definition(&self, id: SurveyId) -> Result<SurveyDefinition, StoreError> {
        let found = match self {
            Self::Memory(m) => m.definition(id),
            Self::Postgres(pool) => db::surveys::load_definition(pool, id).await?,
        };
        found.ok_or_else(|| StoreError::NotFound(format!("survey {id}")))
    }

    /// One question with its options.
    pub async fn question(&self, id: QuestionId) -> Result<Question, StoreError> {
        let found = match self {
            Self::Memory(m) => m.question(id),
            Self::Postgres(pool) => db::surveys::load_question(pool, id).await?,
        };
        found.ok_or_else(|| StoreError::NotFound(format!("question {id}")))
    }

    /// An option together with the role of its question.
    async fn option_with_role(
        &self,
        id: OptionId,
    ) -> Result<(QuestionOption, Option<QuestionRole>), StoreError> {
        let found = match self {
            Self::Memory(m) => m.option_with_role(id),
            Self::Postgres(pool) => db::surveys::load_option_with_role(pool, id).await?,
        };
        found.ok_or_else(|| StoreError::NotFound(format!("option {id}")))
    }

    async fn require_role(&self, id: OptionId, role: QuestionRole) -> Result<(), StoreError> {
        let (_, actual) = self.option_with_role(id).await?;
        if actual == Some(role) {
            Ok(())
        } else {
            Err(AssociationError::WrongOptionRole {
                option: id,
                expected: role.as_str(),
            }
            .into())
        }
    }

    /// Append an option to a choice question.
    ///
    /// The value is slugged from the text once and never changes.
    pub async fn create_option(
        &self,
        question_id: QuestionId,
        option_text: &str,
    ) -> Result<QuestionOption, StoreError> {
        let question = self.question(question_id).await?;
        if !question.question_type.has_options() {
            return Err(ValidationError::OptionsNotSupported(question_id).into());
        }
        let text = option_text.trim();
        let value = option_value_for(text)?;
        let duplicate = || format!("question {question_id} already has an option with value {value:?}");
        if question.options.iter().any(|o| o.option_value == value) {
            return Err(StoreError::Conflict(duplicate()));
        }
        match self {
            Self::Memory(m) => m.insert_option(question_id, text, &value),
            Self::Postgres(pool) => db::surveys::insert_option(pool, question_id, text, &value)
                .await
                .map_err(|e| StoreError::from(e).conflict_as(duplicate)),
        }
    }

    /// Change an option's display text. The value is left alone.
    pub async fn update_option(
        &self,
        id: OptionId,
        option_text: &str,
    ) -> Result<QuestionOption, StoreError> {
        let text = option_text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyOptionText.into());
        }
        let updated = match self {
            Self::Memory(m) => m.update_option(id, text),
            Self::Postgres(pool) => db::surveys::update_option_text(pool, id, text).await?,
        };
        updated.ok_or_else(|| StoreError::NotFound(format!("option {id}")))
    }

    /// Delete an option and any assignments that reference it.
    pub async fn delete_option(&self, id: OptionId) -> Result<(), StoreError> {
        let deleted = match self {
            Self::Memory(m) => m.delete_option(id),
            Self::Postgres(pool) => db::surveys::delete_option(pool, id).await?,
        };
        deleted
            .then_some(())
            .ok_or_else(|| StoreError::NotFound(format!("option {id}")))
    }

    // -- Associations -------------------------------------------------------

    pub async fn list_gm_conventions(&self) -> Result<Vec<GmConvention>, StoreError> {
        match self {
            Self::Memory(m) => Ok(m.gm_conventions()),
            Self::Postgres(pool) => Ok(db::associations::list_gm_conventions(pool).await?),
        }
    }

    pub async fn list_gm_adventures(&self) -> Result<Vec<GmAdventure>, StoreError> {
        match self {
            Self::Memory(m) => Ok(m.gm_adventures()),
            Self::Postgres(pool) => Ok(db::associations::list_gm_adventures(pool).await?),
        }
    }

    /// Index over every assignment row.
    pub async fn association_index(&self) -> Result<AssociationIndex, StoreError> {
        match self {
            Self::Memory(m) => Ok(m.association_index()),
            Self::Postgres(pool) => {
                let conventions = db::associations::list_gm_conventions(pool).await?;
                let adventures = db::associations::list_gm_adventures(pool).await?;
                Ok(AssociationIndex::new(&conventions, &adventures))
            }
        }
    }

    /// Assign a GM to a convention.
    pub async fn create_gm_convention(
        &self,
        gm: OptionId,
        convention: OptionId,
    ) -> Result<GmConvention, StoreError> {
        self.require_role(gm, QuestionRole::GameMaster).await?;
        self.require_role(convention, QuestionRole::Convention).await?;
        let duplicate = || format!("GM option {gm} is already assigned to convention option {convention}");
        match self {
            Self::Memory(m) => m.insert_gm_convention(gm, convention),
            Self::Postgres(pool) => db::associations::insert_gm_convention(pool, gm, convention)
                .await
                .map_err(|e| StoreError::from(e).conflict_as(duplicate)),
        }
    }

    /// Remove a GM/convention assignment and the adventures under it.
    pub async fn delete_gm_convention(&self, id: AssignmentId) -> Result<(), StoreError> {
        let deleted = match self {
            Self::Memory(m) => m.delete_gm_convention(id),
            Self::Postgres(pool) => db::associations::delete_gm_convention(pool, id).await?,
        };
        deleted
            .then_some(())
            .ok_or_else(|| StoreError::NotFound(format!("gm_convention {id}")))
    }

    /// Record that a GM runs an adventure at a convention.
    ///
    /// The (GM, convention) pair must already be assigned.
    pub async fn create_gm_adventure(
        &self,
        gm: OptionId,
        convention: OptionId,
        adventure: OptionId,
    ) -> Result<GmAdventure, StoreError> {
        self.require_role(adventure, QuestionRole::Adventure).await?;
        self.association_index()
            .await?
            .check_adventure(gm, convention)?;
        let duplicate = || {
            format!("GM option {gm} already runs adventure option {adventure} at convention option {convention}")
        };
        match self {
            Self::Memory(m) => m.insert_gm_adventure(gm, convention, adventure),
            Self::Postgres(pool) => {
                db::associations::insert_gm_adventure(pool, gm, convention, adventure)
                    .await
                    .map_err(|e| StoreError::from(e).conflict_as(duplicate))
            }
        }
    }

    pub async fn delete_gm_adventure(&self, id: AssignmentId) -> Result<(), StoreError> {
        let deleted = match self {
            Self::Memory(m) => m.delete_gm_adventure(id),
            Self::Postgres(pool) => db::associations::delete_gm_adventure(pool, id).await?,
        };
        deleted
            .then_some(())
            .ok_or_else(|| StoreError::NotFound(format!("gm_adventure {id}")))
    }

    // -- Responses ------------------------------------------------------------

    /// The survey a response belongs to.
    pub async fn response_survey(&self, id: ResponseId) -> Result<SurveyId, StoreError> {
        let found = match self {
            Self::Memory(m) => m.response_survey(id),
            Self::Postgres(pool) => db::responses::response_survey(pool, id).await?,
        };
        found.ok_or_else(|| StoreError::NotFound(format!("response {id}")))
    }

    /// Store a response and its answers atomically.
    pub async fn create_response(&self, new: NewResponse) -> Result<ResponseId, StoreError> {
        match self {
            Self::Memory(m) => m.insert_response(new),
            Self::Postgres(pool) => db::responses::insert_response(pool, &new).await,
        }
    }

    /// Attach answers to an existing response of `survey_id`.
    ///
    /// Questions that already have answers for the response are skipped.
    /// Returns the number of rows inserted.
    pub async fn attach_answers(
        &self,
        survey_id: SurveyId,
        response_id: ResponseId,
        answers: &[AnswerInput],
    ) -> Result<u64, StoreError> {
        let inserted = match self {
            Self::Memory(m) => m.attach_answers(survey_id, response_id, answers)?,
            Self::Postgres(pool) => {
                db::responses::attach_answers(pool, survey_id, response_id, answers).await?
            }
        };
        inserted.ok_or_else(|| {
            StoreError::NotFound(format!("response {response_id} in survey {survey_id}"))
        })
    }

    /// Newest responses of a survey with their answers.
    pub async fn list_responses(
        &self,
        survey_id: SurveyId,
        limit: u32,
    ) -> Result<Vec<ResponseWithAnswers>, StoreError> {
        match self {
            Self::Memory(m) => Ok(m.list_responses(survey_id, limit)),
            Self::Postgres(pool) => Ok(db::responses::list_responses(pool, survey_id, limit).await?),
        }
    }

    /// Every answer to the given questions, across responses.
    pub async fn answers_for_questions(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<Answer>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Self::Memory(m) => Ok(m.answers_for_questions(ids)),
            Self::Postgres(pool) => Ok(db::responses::answers_for_questions(pool, ids).await?),
        }
    }

    /// Delete every response and answer.
    ///
    /// GM interest records and deliveries go with their responses; coupon
    /// codes stay in the inventory without a response link.
    pub async fn clear_responses(&self) -> Result<ClearedResponses, StoreError> {
        match self {
            Self::Memory(m) => Ok(m.clear_responses()),
            Self::Postgres(pool) => Ok(db::responses::clear(pool).await?),
        }
    }

    /// Delete the answers to a survey's GM contact questions.
    pub async fn remove_contact_answers(&self, survey_id: SurveyId) -> Result<u64, StoreError> {
        let ids = self.definition(survey_id).await?.contact_question_ids();
        if ids.is_empty() {
            return Ok(0);
        }
        match self {
            Self::Memory(m) => Ok(m.delete_answers_for_questions(&ids)),
            Self::Postgres(pool) => Ok(db::responses::delete_answers_for_questions(pool, &ids).await?),
        }
    }

    // -- GM interest ----------------------------------------------------------

    /// Insert or replace the GM interest record of a response.
    pub async fn upsert_gm_interest(
        &self,
        response_id: ResponseId,
        contact: &GmContact,
    ) -> Result<GmInterest, StoreError> {
        self.response_survey(response_id).await?;
        let contact = contact.trimmed();
        match self {
            Self::Memory(m) => m.upsert_gm_interest(response_id, &contact),
            Self::Postgres(pool) => Ok(db::gm_interest::upsert(pool, response_id, &contact).await?),
        }
    }

    /// GM interest records sorted by last name, then first name.
    pub async fn list_gm_interest(&self) -> Result<Vec<GmInterestRow>, StoreError> {
        let mut rows = match self {
            Self::Memory(m) => m.gm_interest_rows(),
            Self::Postgres(pool) => db::gm_interest::list(pool).await?,
        };
        consurvey_core::gm_interest::sort_by_name(&mut rows);
        Ok(rows)
    }

    /// Rebuild GM interest records from contact-question answers.
    ///
    /// Non-blank answered fields overwrite the stored record; blank ones
    /// keep what is already there.
    pub async fn reprocess_gm_interest(
        &self,
        survey_id: SurveyId,
    ) -> Result<ReprocessReport, StoreError> {
        let definition = self.definition(survey_id).await?;
        let ids = definition.contact_question_ids();
        if ids.is_empty() {
            return Err(StoreError::Invalid(format!(
                "survey {survey_id} has no GM contact questions"
            )));
        }

        let mut by_response: BTreeMap<ResponseId, Vec<Answer>> = BTreeMap::new();
        for answer in self.answers_for_questions(&ids).await? {
            by_response.entry(answer.response_id).or_default().push(answer);
        }
        let existing: HashMap<ResponseId, GmInterest> = self
            .list_gm_interest()
            .await?
            .into_iter()
            .map(|row| (row.interest.response_id, row.interest))
            .collect();

        let mut report = ReprocessReport::default();
        for (response_id, answers) in by_response {
            let Some(found) = contact_from_answers(&definition, &answers) else {
                report.skipped += 1;
                continue;
            };
            let merged = match existing.get(&response_id) {
                Some(current) => merge_contact(current, found),
                None => found,
            };
            self.upsert_gm_interest(response_id, &merged).await?;
            report.processed += 1;
        }
        tracing::info!(
            survey_id = %survey_id,
            processed = report.processed,
            skipped = report.skipped,
            "reprocessed GM interest"
        );
        Ok(report)
    }

    // -- Coupons ----------------------------------------------------------------

    /// Bind one eligible code to `response_id`, or return the code it
    /// already holds. `None` when the pool is exhausted.
    pub async fn assign_coupon(
        &self,
        response_id: ResponseId,
        now: DateTime<Utc>,
    ) -> Result<Option<CouponCode>, StoreError> {
        self.response_survey(response_id).await?;
        match self {
            Self::Memory(m) => Ok(m.assign_coupon(response_id, now)),
            Self::Postgres(pool) => Ok(db::coupons::assign(pool, response_id, now).await?),
        }
    }

    /// One code by its normalized form.
    pub async fn coupon(&self, code: &str) -> Result<CouponCode, StoreError> {
        let found = match self {
            Self::Memory(m) => m.coupon_by_code(code),
            Self::Postgres(pool) => db::coupons::find(pool, code).await?,
        };
        found.ok_or_else(|| StoreError::NotFound(format!("coupon code {code}")))
    }

    /// Record a copy or email of an already-normalized code.
    pub async fn mark_coupon(
        &self,
        code: &str,
        action: MarkAction,
        now: DateTime<Utc>,
    ) -> Result<CouponCode, StoreError> {
        let marked = match self {
            Self::Memory(m) => m.mark_coupon(code, action, now)?,
            Self::Postgres(pool) => db::coupons::mark(pool, code, action, now).await?,
        };
        marked.ok_or_else(|| StoreError::NotFound(format!("coupon code {code}")))
    }

    /// Insert or merge a delivery record for (response, code).
    pub async fn record_delivery(&self, new: NewDelivery) -> Result<CouponDelivery, StoreError> {
        self.response_survey(new.response_id).await?;
        match self {
            Self::Memory(m) => m.record_delivery(new),
            Self::Postgres(pool) => Ok(db::coupons::upsert_delivery(pool, &new).await?),
        }
    }

    /// Codes newest first, with stored statuses brought up to date.
    pub async fn list_coupons(
        &self,
        status: Option<CouponStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<CouponCode>, StoreError> {
        match self {
            Self::Memory(m) => Ok(m.list_coupons(status, now)),
            Self::Postgres(pool) => Ok(db::coupons::list(pool, status, now).await?),
        }
    }

    /// Import codes, reporting each one that could not be added.
    pub async fn import_coupons(
        &self,
        codes: &[String],
        notes: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<ImportReport, StoreError> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        match self {
            Self::Memory(m) => Ok(m.import_coupons(codes, notes, expires_at)),
            Self::Postgres(pool) => Ok(db::coupons::import(pool, codes, notes, expires_at).await?),
        }
    }

    pub async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        let deleted = match self {
            Self::Memory(m) => m.delete_coupon(id),
            Self::Postgres(pool) => db::coupons::delete(pool, id).await?,
        };
        deleted
            .then_some(())
            .ok_or_else(|| StoreError::NotFound(format!("coupon {id}")))
    }

    /// Totals for the metrics gauges.
    pub async fn counts(&self, now: DateTime<Utc>) -> Result<StoreCounts, StoreError> {
        match self {
            Self::Memory(m) => Ok(m.counts(now)),
            Self::Postgres(pool) => Ok(db::coupons::counts(pool, now).await?),
        }
    }
}

fn merge_contact(current: &GmInterest, found: GmContact) -> GmContact {
    let pick = |new: String, old: &str| if new.is_empty() { old.to_string() } else { new };
    GmContact {
        first_name: pick(found.first_name, &current.first_name),
        last_name: pick(found.last_name, &current.last_name),
        email: pick(found.email, &current.email),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consurvey_core::GmInterestId;

    #[test]
    fn merge_keeps_stored_fields_for_blank_answers() {
        let current = GmInterest {
            id: GmInterestId::new(1),
            response_id: ResponseId::new(1),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "old@example.com".into(),
            created_at: Utc::now(),
        };
        let found = GmContact {
            first_name: String::new(),
            last_name: "King".into(),
            email: "new@example.com".into(),
        };
        let merged = merge_contact(&current, found);
        assert_eq!(merged.first_name, "Ada");
        assert_eq!(merged.last_name, "King");
        assert_eq!(merged.email, "new@example.com");
    }

    #[test]
    fn conflict_message_is_replaced() {
        let err = StoreError::Conflict("duplicate key value".into()).conflict_as(|| "taken".into());
        assert!(matches!(err, StoreError::Conflict(msg) if msg == "taken"));

        let other = StoreError::Invalid("x".into()).conflict_as(|| "taken".into());
        assert!(matches!(other, StoreError::Invalid(_)));
    }
}
