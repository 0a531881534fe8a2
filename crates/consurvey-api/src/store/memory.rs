//! In-memory backend.
//!
//! All tables live behind one `parking_lot::RwLock`, so every operation,
//! including coupon allocation, is atomic with respect to every other.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use consurvey_core::coupon::{normalize_code, select_allocatable};
use consurvey_core::survey::default_survey;
use consurvey_core::{
    Answer, AnswerId, AnswerInput, AssignmentId, AssociationIndex, CouponCode, CouponDelivery,
    CouponError, CouponId, CouponStatus, DeliveryId, GmAdventure, GmContact, GmConvention,
    GmInterest, GmInterestId, GmInterestRow, ImportReport, MarkAction, OptionId, Question,
    QuestionId, QuestionOption, QuestionRole, ResponseId, ResponseWithAnswers, Survey,
    SurveyDefinition, SurveyId, SurveyResponse,
};

use super::{ClearedResponses, NewDelivery, NewResponse, StoreCounts, StoreError};

/// Rows keyed by id with their own sequence.
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i64, T>,
    seq: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            seq: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    /// Insert a row at an explicit id, keeping the sequence ahead of it.
    fn seed(&mut self, id: i64, row: T) {
        self.seq = self.seq.max(id);
        self.rows.insert(id, row);
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

#[derive(Debug, Default)]
struct Tables {
    surveys: Table<Survey>,
    /// Questions without their options; options live in their own table.
    questions: Table<Question>,
    options: Table<QuestionOption>,
    responses: Table<SurveyResponse>,
    answers: Table<Answer>,
    gm_interest: Table<GmInterest>,
    gm_conventions: Table<GmConvention>,
    gm_adventures: Table<GmAdventure>,
    coupons: Table<CouponCode>,
    deliveries: Table<CouponDelivery>,
}

impl Tables {
    fn with_options(&self, question: &Question) -> Question {
        let mut q = question.clone();
        q.options = self
            .options
            .values()
            .filter(|o| o.question_id == q.id)
            .cloned()
            .collect();
        q.options.sort_by_key(|o| (o.display_order, o.id));
        q
    }

    fn answers_of(&self, response: ResponseId) -> Vec<Answer> {
        self.answers
            .values()
            .filter(|a| a.response_id == response)
            .cloned()
            .collect()
    }

    fn insert_answers(&mut self, response: ResponseId, rows: &[AnswerInput], now: DateTime<Utc>) {
        for row in rows {
            let id = self.answers.next_id();
            self.answers.rows.insert(
                id,
                Answer {
                    id: AnswerId::new(id),
                    response_id: response,
                    question_id: row.question_id,
                    answer_text: row.answer_text.clone(),
                    answer_value: row.answer_value.clone(),
                    created_at: now,
                },
            );
        }
    }

    fn check_questions(&self, survey: SurveyId, rows: &[AnswerInput]) -> Result<(), StoreError> {
        for row in rows {
            let belongs = self
                .questions
                .rows
                .get(&row.question_id.get())
                .is_some_and(|q| q.survey_id == survey);
            if !belongs {
                return Err(consurvey_core::ValidationError::UnknownQuestion(row.question_id).into());
            }
        }
        Ok(())
    }
}

/// Shared in-memory tables. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// A store holding the default survey.
    pub fn seeded() -> Self {
        let store = Self::default();
        store.seed(default_survey());
        store
    }

    /// Add a survey definition, keeping its ids.
    pub fn seed(&self, definition: SurveyDefinition) {
        let mut t = self.tables.write();
        let survey_id = definition.survey.id;
        t.surveys.seed(survey_id.get(), definition.survey);
        for mut question in definition.questions {
            for option in std::mem::take(&mut question.options) {
                t.options.seed(option.id.get(), option);
            }
            t.questions.seed(question.id.get(), question);
        }
    }

    // -- Surveys and options ------------------------------------------------

    pub(crate) fn definition(&self, id: SurveyId) -> Option<SurveyDefinition> {
        let t = self.tables.read();
        let survey = t.surveys.rows.get(&id.get())?.clone();
        let questions = t
            .questions
            .values()
            .filter(|q| q.survey_id == id)
            .map(|q| t.with_options(q))
            .collect();
        Some(SurveyDefinition::new(survey, questions))
    }

    pub(crate) fn question(&self, id: QuestionId) -> Option<Question> {
        let t = self.tables.read();
        t.questions.rows.get(&id.get()).map(|q| t.with_options(q))
    }

    pub(crate) fn option_with_role(
        &self,
        id: OptionId,
    ) -> Option<(QuestionOption, Option<QuestionRole>)> {
        let t = self.tables.read();
        let option = t.options.rows.get(&id.get())?.clone();
        let role = t
            .questions
            .rows
            .get(&option.question_id.get())
            .and_then(|q| q.role);
        Some((option, role))
    }

    pub(crate) fn insert_option(
        &self,
        question_id: QuestionId,
        text: &str,
        value: &str,
    ) -> Result<QuestionOption, StoreError> {
        let mut t = self.tables.write();
        let siblings: Vec<&QuestionOption> = t
            .options
            .values()
            .filter(|o| o.question_id == question_id)
            .collect();
        if siblings.iter().any(|o| o.option_value == value) {
            return Err(StoreError::Conflict(format!(
                "question {question_id} already has an option with value {value:?}"
            )));
        }
        let display_order = siblings.iter().map(|o| o.display_order).max().unwrap_or(0) + 1;
        let id = t.options.next_id();
        let option = QuestionOption {
            id: OptionId::new(id),
            question_id,
            option_text: text.to_string(),
            option_value: value.to_string(),
            display_order,
        };
        t.options.rows.insert(id, option.clone());
        Ok(option)
    }

    pub(crate) fn update_option(&self, id: OptionId, text: &str) -> Option<QuestionOption> {
        let mut t = self.tables.write();
        let option = t.options.rows.get_mut(&id.get())?;
        option.option_text = text.to_string();
        Some(option.clone())
    }

    pub(crate) fn delete_option(&self, id: OptionId) -> bool {
        let mut t = self.tables.write();
        if t.options.rows.remove(&id.get()).is_none() {
            return false;
        }
        t.gm_conventions
            .rows
            .retain(|_, r| r.gm_option_id != id && r.convention_option_id != id);
        t.gm_adventures.rows.retain(|_, r| {
            r.gm_option_id != id && r.convention_option_id != id && r.adventure_option_id != id
        });
        true
    }

    // -- Associations -------------------------------------------------------

    pub(crate) fn gm_conventions(&self) -> Vec<GmConvention> {
        self.tables.read().gm_conventions.values().cloned().collect()
    }

    pub(crate) fn gm_adventures(&self) -> Vec<GmAdventure> {
        self.tables.read().gm_adventures.values().cloned().collect()
    }

    pub(crate) fn association_index(&self) -> AssociationIndex {
        let t = self.tables.read();
        let conventions: Vec<GmConvention> = t.gm_conventions.values().cloned().collect();
        let adventures: Vec<GmAdventure> = t.gm_adventures.values().cloned().collect();
        AssociationIndex::new(&conventions, &adventures)
    }

    pub(crate) fn insert_gm_convention(
        &self,
        gm: OptionId,
        convention: OptionId,
    ) -> Result<GmConvention, StoreError> {
        let mut t = self.tables.write();
        let exists = t
            .gm_conventions
            .values()
            .any(|r| r.gm_option_id == gm && r.convention_option_id == convention);
        if exists {
            return Err(StoreError::Conflict(format!(
                "GM option {gm} is already assigned to convention option {convention}"
            )));
        }
        let id = t.gm_conventions.next_id();
        let row = GmConvention {
            id: AssignmentId::new(id),
            gm_option_id: gm,
            convention_option_id: convention,
            created_at: Utc::now(),
        };
        t.gm_conventions.rows.insert(id, row.clone());
        Ok(row)
    }

    pub(crate) fn delete_gm_convention(&self, id: AssignmentId) -> bool {
        let mut t = self.tables.write();
        let Some(row) = t.gm_conventions.rows.remove(&id.get()) else {
            return false;
        };
        t.gm_adventures.rows.retain(|_, a| {
            !(a.gm_option_id == row.gm_option_id && a.convention_option_id == row.convention_option_id)
        });
        true
    }

    pub(crate) fn insert_gm_adventure(
        &self,
        gm: OptionId,
        convention: OptionId,
        adventure: OptionId,
    ) -> Result<GmAdventure, StoreError> {
        let mut t = self.tables.write();
        let paired = t
            .gm_conventions
            .values()
            .any(|r| r.gm_option_id == gm && r.convention_option_id == convention);
        if !paired {
            return Err(
                consurvey_core::AssociationError::MissingConventionAssignment { gm, convention }.into(),
            );
        }
        let exists = t.gm_adventures.values().any(|r| {
            r.gm_option_id == gm
                && r.convention_option_id == convention
                && r.adventure_option_id == adventure
        });
        if exists {
            return Err(StoreError::Conflict(format!(
                "GM option {gm} already runs adventure option {adventure} at convention option {convention}"
            )));
        }
        let id = t.gm_adventures.next_id();
        let row = GmAdventure {
            id: AssignmentId::new(id),
            gm_option_id: gm,
            convention_option_id: convention,
            adventure_option_id: adventure,
            created_at: Utc::now(),
        };
        t.gm_adventures.rows.insert(id, row.clone());
        Ok(row)
    }

    pub(crate) fn delete_gm_adventure(&self, id: AssignmentId) -> bool {
        self.tables.write().gm_adventures.rows.remove(&id.get()).is_some()
    }

    // -- Responses ------------------------------------------------------------

    pub(crate) fn response_survey(&self, id: ResponseId) -> Option<SurveyId> {
        self.tables
            .read()
            .responses
            .rows
            .get(&id.get())
            .map(|r| r.survey_id)
    }

    pub(crate) fn insert_response(&self, new: NewResponse) -> Result<ResponseId, StoreError> {
        let mut t = self.tables.write();
        if !t.surveys.rows.contains_key(&new.survey_id.get()) {
            return Err(StoreError::NotFound(format!("survey {}", new.survey_id)));
        }
        t.check_questions(new.survey_id, &new.answers)?;

        let now = Utc::now();
        let id = ResponseId::new(t.responses.next_id());
        t.responses.rows.insert(
            id.get(),
            SurveyResponse {
                id,
                survey_id: new.survey_id,
                respondent_email: new.respondent.email,
                respondent_name: new.respondent.name,
                submitted_at: now,
                ip_address: new.ip_address,
                user_agent: new.user_agent,
                metadata: serde_json::json!({}),
            },
        );
        t.insert_answers(id, &new.answers, now);
        Ok(id)
    }

    /// `None` when the response is not part of `survey`.
    pub(crate) fn attach_answers(
        &self,
        survey: SurveyId,
        response: ResponseId,
        rows: &[AnswerInput],
    ) -> Result<Option<u64>, StoreError> {
        let mut t = self.tables.write();
        let matches = t
            .responses
            .rows
            .get(&response.get())
            .is_some_and(|r| r.survey_id == survey);
        if !matches {
            return Ok(None);
        }
        t.check_questions(survey, rows)?;

        let answered: BTreeSet<QuestionId> = t
            .answers
            .values()
            .filter(|a| a.response_id == response)
            .map(|a| a.question_id)
            .collect();
        let fresh: Vec<AnswerInput> = rows
            .iter()
            .filter(|r| !answered.contains(&r.question_id))
            .cloned()
            .collect();
        t.insert_answers(response, &fresh, Utc::now());
        Ok(Some(fresh.len() as u64))
    }

    pub(crate) fn list_responses(&self, survey: SurveyId, limit: u32) -> Vec<ResponseWithAnswers> {
        let t = self.tables.read();
        let mut responses: Vec<&SurveyResponse> =
            t.responses.values().filter(|r| r.survey_id == survey).collect();
        responses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        responses
            .into_iter()
            .take(limit as usize)
            .map(|r| ResponseWithAnswers {
                response: r.clone(),
                answers: t.answers_of(r.id),
            })
            .collect()
    }

    pub(crate) fn answers_for_questions(&self, ids: &[QuestionId]) -> Vec<Answer> {
        self.tables
            .read()
            .answers
            .values()
            .filter(|a| ids.contains(&a.question_id))
            .cloned()
            .collect()
    }

    pub(crate) fn delete_answers_for_questions(&self, ids: &[QuestionId]) -> u64 {
        let mut t = self.tables.write();
        let before = t.answers.rows.len();
        t.answers.rows.retain(|_, a| !ids.contains(&a.question_id));
        (before - t.answers.rows.len()) as u64
    }

    pub(crate) fn clear_responses(&self) -> ClearedResponses {
        let mut t = self.tables.write();
        let cleared = ClearedResponses {
            answers: t.answers.rows.len() as u64,
            responses: t.responses.rows.len() as u64,
        };
        t.answers.rows.clear();
        t.responses.rows.clear();
        t.gm_interest.rows.clear();
        t.deliveries.rows.clear();
        for coupon in t.coupons.rows.values_mut() {
            coupon.response_id = None;
        }
        cleared
    }

    // -- GM interest ----------------------------------------------------------

    pub(crate) fn upsert_gm_interest(
        &self,
        response: ResponseId,
        contact: &GmContact,
    ) -> Result<GmInterest, StoreError> {
        let mut t = self.tables.write();
        if !t.responses.rows.contains_key(&response.get()) {
            return Err(StoreError::NotFound(format!("response {response}")));
        }
        if let Some(row) = t.gm_interest.rows.values_mut().find(|g| g.response_id == response) {
            row.first_name = contact.first_name.clone();
            row.last_name = contact.last_name.clone();
            row.email = contact.email.clone();
            return Ok(row.clone());
        }
        let id = t.gm_interest.next_id();
        let row = GmInterest {
            id: GmInterestId::new(id),
            response_id: response,
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            email: contact.email.clone(),
            created_at: Utc::now(),
        };
        t.gm_interest.rows.insert(id, row.clone());
        Ok(row)
    }

    pub(crate) fn gm_interest_rows(&self) -> Vec<GmInterestRow> {
        let t = self.tables.read();
        t.gm_interest
            .values()
            .map(|g| GmInterestRow {
                interest: g.clone(),
                submitted_at: t
                    .responses
                    .rows
                    .get(&g.response_id.get())
                    .map(|r| r.submitted_at),
            })
            .collect()
    }

    // -- Coupons ----------------------------------------------------------------

    pub(crate) fn assign_coupon(&self, response: ResponseId, now: DateTime<Utc>) -> Option<CouponCode> {
        let mut t = self.tables.write();
        if let Some(held) = t.coupons.values().find(|c| c.response_id == Some(response)) {
            return Some(held.clone());
        }
        let pool: Vec<CouponCode> = t.coupons.values().cloned().collect();
        let chosen = pool.get(select_allocatable(&pool, now)?)?.id;
        let coupon = t.coupons.rows.get_mut(&chosen.get())?;
        coupon.assign(response, now);
        Some(coupon.clone())
    }

    pub(crate) fn coupon_by_code(&self, code: &str) -> Option<CouponCode> {
        let t = self.tables.read();
        let found = t.coupons.values().find(|c| c.code == code).cloned();
        found
    }

    pub(crate) fn mark_coupon(
        &self,
        code: &str,
        action: MarkAction,
        now: DateTime<Utc>,
    ) -> Result<Option<CouponCode>, CouponError> {
        let mut t = self.tables.write();
        let Some(coupon) = t.coupons.rows.values_mut().find(|c| c.code == code) else {
            return Ok(None);
        };
        coupon.mark(action, now)?;
        Ok(Some(coupon.clone()))
    }

    pub(crate) fn record_delivery(&self, new: NewDelivery) -> Result<CouponDelivery, StoreError> {
        let mut t = self.tables.write();
        if !t.responses.rows.contains_key(&new.response_id.get()) {
            return Err(StoreError::NotFound(format!("response {}", new.response_id)));
        }
        if let Some(row) = t
            .deliveries
            .rows
            .values_mut()
            .find(|d| d.response_id == new.response_id && d.coupon_code == new.coupon_code)
        {
            row.email_sent |= new.email_sent;
            if new.email_address.is_some() {
                row.email_address = new.email_address;
            }
            return Ok(row.clone());
        }
        let id = t.deliveries.next_id();
        let row = CouponDelivery {
            id: DeliveryId::new(id),
            response_id: new.response_id,
            coupon_code: new.coupon_code,
            email_sent: new.email_sent,
            email_address: new.email_address,
            delivered_at: Utc::now(),
        };
        t.deliveries.rows.insert(id, row.clone());
        Ok(row)
    }

    pub(crate) fn list_coupons(
        &self,
        status: Option<CouponStatus>,
        now: DateTime<Utc>,
    ) -> Vec<CouponCode> {
        let mut t = self.tables.write();
        for coupon in t.coupons.rows.values_mut() {
            let effective = coupon.effective_status(now);
            if coupon.status != effective {
                tracing::debug!(code = %coupon.code, from = %coupon.status, to = %effective, "correcting coupon status");
                coupon.status = effective;
            }
        }
        let mut out: Vec<CouponCode> = t
            .coupons
            .values()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    pub(crate) fn import_coupons(
        &self,
        codes: &[String],
        notes: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> ImportReport {
        let mut t = self.tables.write();
        let mut report = ImportReport::default();
        let now = Utc::now();
        for raw in codes {
            let code = match normalize_code(raw) {
                Ok(code) => code,
                Err(_) => {
                    report.reject(raw.as_str(), "empty code");
                    continue;
                }
            };
            if t.coupons.values().any(|c| c.code == code) {
                report.reject(code, "already exists");
                continue;
            }
            let id = t.coupons.next_id();
            let coupon = CouponCode {
                id: CouponId::new(id),
                code,
                status: CouponStatus::Available,
                response_id: None,
                assigned_at: None,
                copied_at: None,
                emailed_at: None,
                expires_at,
                notes: notes.map(str::to_string),
                created_at: now,
            };
            t.coupons.rows.insert(id, coupon.clone());
            report.created.push(coupon);
        }
        report
    }

    pub(crate) fn delete_coupon(&self, id: CouponId) -> bool {
        self.tables.write().coupons.rows.remove(&id.get()).is_some()
    }

    pub(crate) fn counts(&self, now: DateTime<Utc>) -> StoreCounts {
        let t = self.tables.read();
        let mut coupons_by_status: HashMap<CouponStatus, u64> = HashMap::new();
        for coupon in t.coupons.values() {
            *coupons_by_status.entry(coupon.effective_status(now)).or_default() += 1;
        }
        StoreCounts {
            responses: t.responses.rows.len() as u64,
            coupons_by_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use consurvey_core::RespondentInfo;
    use proptest::prelude::*;

    fn response(store: &MemoryStore) -> ResponseId {
        store
            .insert_response(NewResponse {
                survey_id: SurveyId::new(1),
                respondent: RespondentInfo::default(),
                ip_address: None,
                user_agent: None,
                answers: vec![AnswerInput {
                    question_id: QuestionId::new(4),
                    answer_text: None,
                    answer_value: Some("5".into()),
                }],
            })
            .unwrap()
    }

    fn import(store: &MemoryStore, codes: &[&str]) -> ImportReport {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        store.import_coupons(&codes, None, Utc::now() + Duration::days(30))
    }

    #[test]
    fn seeded_store_serves_default_survey() {
        let store = MemoryStore::seeded();
        let def = store.definition(SurveyId::new(1)).unwrap();
        assert_eq!(def.questions.len(), 10);
        let conventions = def.question_by_role(QuestionRole::Convention).unwrap();
        assert_eq!(conventions.options.len(), 4);
    }

    #[test]
    fn new_options_append_after_seeded_ids() {
        let store = MemoryStore::seeded();
        let gm = store.insert_option(QuestionId::new(2), "Ana Smith", "ana_smith").unwrap();
        assert_eq!(gm.id, OptionId::new(5));
        assert_eq!(gm.display_order, 1);
        let conv = store.insert_option(QuestionId::new(1), "Con X", "con_x").unwrap();
        assert_eq!(conv.display_order, 5);
        assert!(matches!(
            store.insert_option(QuestionId::new(1), "con x", "con_x"),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn deleting_a_convention_pair_removes_its_adventures() {
        let store = MemoryStore::seeded();
        let gm = store.insert_option(QuestionId::new(2), "Ana", "ana").unwrap().id;
        let adv = store.insert_option(QuestionId::new(3), "Heist", "heist").unwrap().id;
        let conv = OptionId::new(1);

        assert!(matches!(
            store.insert_gm_adventure(gm, conv, adv),
            Err(StoreError::Association(_))
        ));
        let pair = store.insert_gm_convention(gm, conv).unwrap();
        store.insert_gm_adventure(gm, conv, adv).unwrap();
        assert_eq!(store.gm_adventures().len(), 1);

        assert!(store.delete_gm_convention(pair.id));
        assert!(store.gm_adventures().is_empty());
    }

    #[test]
    fn attach_skips_questions_already_answered() {
        let store = MemoryStore::seeded();
        let id = response(&store);
        let rows = vec![
            AnswerInput {
                question_id: QuestionId::new(4),
                answer_text: None,
                answer_value: Some("1".into()),
            },
            AnswerInput {
                question_id: QuestionId::new(7),
                answer_text: None,
                answer_value: Some("yes".into()),
            },
        ];
        assert_eq!(store.attach_answers(SurveyId::new(1), id, &rows).unwrap(), Some(1));
        assert_eq!(store.attach_answers(SurveyId::new(2), id, &rows).unwrap(), None);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let store = MemoryStore::seeded();
        let err = store
            .insert_response(NewResponse {
                survey_id: SurveyId::new(1),
                respondent: RespondentInfo::default(),
                ip_address: None,
                user_agent: None,
                answers: vec![AnswerInput {
                    question_id: QuestionId::new(99),
                    answer_text: Some("x".into()),
                    answer_value: None,
                }],
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn assignment_is_idempotent_per_response() {
        let store = MemoryStore::seeded();
        import(&store, &["a1", "a2"]);
        let r = response(&store);
        let first = store.assign_coupon(r, Utc::now()).unwrap();
        let again = store.assign_coupon(r, Utc::now()).unwrap();
        assert_eq!(first.code, "A1");
        assert_eq!(first.id, again.id);
    }

    #[test]
    fn exhausted_pool_yields_none() {
        let store = MemoryStore::seeded();
        import(&store, &["only"]);
        let a = response(&store);
        let b = response(&store);
        assert!(store.assign_coupon(a, Utc::now()).is_some());
        assert!(store.assign_coupon(b, Utc::now()).is_none());
    }

    #[test]
    fn import_reports_duplicates_and_blanks() {
        let store = MemoryStore::seeded();
        let report = import(&store, &["abc", " ABC ", "", "def"]);
        assert_eq!(report.created.len(), 2);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].code, "ABC");
        assert_eq!(report.errors[0].error, "already exists");
        assert_eq!(report.errors[1].error, "empty code");
    }

    #[test]
    fn listing_corrects_drifted_status() {
        let store = MemoryStore::seeded();
        let codes = vec!["OLD".to_string()];
        store.import_coupons(&codes, None, Utc::now() - Duration::days(1));
        let listed = store.list_coupons(None, Utc::now());
        assert_eq!(listed[0].status, CouponStatus::Expired);
        assert_eq!(store.list_coupons(Some(CouponStatus::Available), Utc::now()).len(), 0);
    }

    #[test]
    fn clear_unlinks_coupons_and_drops_dependents() {
        let store = MemoryStore::seeded();
        import(&store, &["keep"]);
        let r = response(&store);
        store.assign_coupon(r, Utc::now()).unwrap();
        store
            .upsert_gm_interest(
                r,
                &GmContact {
                    first_name: "A".into(),
                    last_name: "B".into(),
                    email: "a@b.c".into(),
                },
            )
            .unwrap();

        let cleared = store.clear_responses();
        assert_eq!(cleared, ClearedResponses { answers: 1, responses: 1 });
        assert!(store.gm_interest_rows().is_empty());
        let coupons = store.list_coupons(None, Utc::now());
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].response_id, None);
    }

    proptest! {
        #[test]
        fn allocation_never_hands_out_a_code_twice(codes in 0usize..8, responses in 1usize..12) {
            let store = MemoryStore::seeded();
            let names: Vec<String> = (0..codes).map(|i| format!("C{i}")).collect();
            store.import_coupons(&names, None, Utc::now() + Duration::days(1));

            let mut handed = BTreeSet::new();
            let mut assigned = 0usize;
            for _ in 0..responses {
                let r = response(&store);
                if let Some(c) = store.assign_coupon(r, Utc::now()) {
                    prop_assert!(handed.insert(c.id));
                    assigned += 1;
                }
            }
            prop_assert_eq!(assigned, codes.min(responses));
        }
    }
}
