//! # Survey Flow State Machine
//!
//! Drives a respondent through the questionnaire one question at a time.
//!
//! ## Phases
//!
//! ```text
//! Answering ──next() past recommendation──▶ Submitting ──response_created──▶ CouponOffer
//!    ▲                                        │                                │     │
//!    └──────────── submission_failed ─────────┘                    volunteer()│     │finish()
//!                                                                              ▼     ▼
//!                          SubmittingVolunteer ◀──next() on last── Volunteering  Completed
//!                                   │                                                ▲
//!                                   └───────────── attach_completed ─────────────────┘
//! ```
//!
//! Phase one creates the response as soon as the recommendation question is
//! answered, so the coupon can be issued without waiting for the optional
//! GM questions. Everything collected afterwards is attached to that same
//! response; the flow never asks for a second response to be created.
//!
//! The flow itself does no I/O. Each submission is returned as a
//! [`FlowStep`] for the caller to send, and the caller reports the result
//! back with [`SurveyFlow::response_created`] / [`SurveyFlow::submission_failed`]
//! or [`SurveyFlow::attach_completed`].

use std::collections::{BTreeMap, BTreeSet};

use crate::answer::{expand_answers, AnswerInput, AnswerValue};
use crate::association::Selection;
use crate::coupon::CouponOutcome;
use crate::error::FlowError;
use crate::gm_interest::GmContact;
use crate::identity::{OptionId, QuestionId, ResponseId};
use crate::question::{is_yes, validate_answer, OptionAvailability, Question, QuestionRole};
use crate::survey::{ConventionMatch, SurveyDefinition};

/// Where the respondent is in the questionnaire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowPhase {
    /// Answering the main questions.
    Answering,
    /// Phase-one submission in flight.
    Submitting,
    /// Response stored; showing the coupon (once resolved).
    CouponOffer { outcome: Option<CouponOutcome> },
    /// Answering the GM volunteer questions.
    Volunteering,
    /// Volunteer answers being attached.
    SubmittingVolunteer,
    /// Done.
    Completed,
}

impl FlowPhase {
    fn name(&self) -> &'static str {
        match self {
            Self::Answering => "answering",
            Self::Submitting => "submitting",
            Self::CouponOffer { .. } => "showing the coupon",
            Self::Volunteering => "volunteering",
            Self::SubmittingVolunteer => "attaching volunteer answers",
            Self::Completed => "completed",
        }
    }
}

/// What the caller must do after [`SurveyFlow::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    /// Moved to the next question; nothing to send.
    Advanced,
    /// Create the response with these answers, then report the id back.
    SubmitResponse {
        answers: Vec<AnswerInput>,
        /// GM contact collected before submission, to store once the
        /// response exists.
        contact: Option<GmContact>,
    },
    /// Attach these answers and the GM contact to an existing response.
    AttachToResponse {
        response_id: ResponseId,
        answers: Vec<AnswerInput>,
        contact: GmContact,
    },
}

/// The conditional multi-step questionnaire.
#[derive(Debug, Clone)]
pub struct SurveyFlow {
    definition: SurveyDefinition,
    preselected: Option<ConventionMatch>,
    answers: BTreeMap<QuestionId, AnswerValue>,
    submitted: BTreeSet<QuestionId>,
    phase: FlowPhase,
    cursor: usize,
    response_id: Option<ResponseId>,
}

impl SurveyFlow {
    /// Start a flow over `definition`.
    ///
    /// A non-empty `preselected_convention` is resolved against the
    /// convention options and hides the convention question.
    pub fn new(definition: SurveyDefinition, preselected_convention: Option<&str>) -> Self {
        let preselected = preselected_convention.and_then(|raw| definition.resolve_convention(raw));
        Self {
            definition,
            preselected,
            answers: BTreeMap::new(),
            submitted: BTreeSet::new(),
            phase: FlowPhase::Answering,
            cursor: 0,
            response_id: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &FlowPhase {
        &self.phase
    }

    /// The survey being answered.
    pub fn definition(&self) -> &SurveyDefinition {
        &self.definition
    }

    /// The resolved pre-selected convention, if any.
    pub fn preselected(&self) -> Option<&ConventionMatch> {
        self.preselected.as_ref()
    }

    /// Response created by phase one, once known.
    pub fn response_id(&self) -> Option<ResponseId> {
        self.response_id
    }

    /// Recorded answer for `question`.
    pub fn answer_for(&self, question: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(&question)
    }

    /// Coupon shown on the offer page, once resolved.
    pub fn coupon(&self) -> Option<&CouponOutcome> {
        match &self.phase {
            FlowPhase::CouponOffer { outcome } => outcome.as_ref(),
            _ => None,
        }
    }

    /// Questions shown in the current phase, in order.
    pub fn visible_questions(&self) -> Vec<&Question> {
        match self.phase {
            FlowPhase::Answering | FlowPhase::Submitting => {
                let wants_contact = self.wants_to_volunteer();
                self.definition
                    .questions
                    .iter()
                    .filter(|q| match q.role {
                        Some(QuestionRole::Convention) => self.preselected.is_none(),
                        Some(role) if role.is_contact() => wants_contact,
                        _ => true,
                    })
                    .collect()
            }
            FlowPhase::Volunteering | FlowPhase::SubmittingVolunteer => {
                let after = self
                    .definition
                    .question_by_role(QuestionRole::Recommendation)
                    .map(|q| q.display_order);
                self.definition
                    .questions
                    .iter()
                    .filter(|q| !self.submitted.contains(&q.id))
                    .filter(|q| match q.role {
                        Some(QuestionRole::GmInterest) => false,
                        Some(role) if role.is_contact() => true,
                        _ => after.is_some_and(|order| q.display_order > order),
                    })
                    .collect()
            }
            FlowPhase::CouponOffer { .. } | FlowPhase::Completed => Vec::new(),
        }
    }

    /// The question under the cursor.
    pub fn current(&self) -> Option<&Question> {
        let visible = self.visible_questions();
        let last = visible.len().checked_sub(1)?;
        visible.get(self.cursor.min(last)).copied()
    }

    /// One-based position and total of visible questions.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.visible_questions().len();
        if total == 0 {
            return (0, 0);
        }
        (self.cursor.min(total - 1) + 1, total)
    }

    /// Whether the cursor is on the last visible question.
    pub fn is_last(&self) -> bool {
        let (pos, total) = self.progress();
        total > 0 && pos == total
    }

    /// Current convention and GM selections, as option ids.
    pub fn selection(&self) -> Selection {
        let convention = match &self.preselected {
            Some(m) => m.option_id,
            None => self.role_option_id(QuestionRole::Convention),
        };
        Selection {
            convention,
            gm: self.role_option_id(QuestionRole::GameMaster),
        }
    }

    /// Record an answer.
    ///
    /// Returns `true` when the convention or GM selection changed, in which
    /// case the caller should fetch a narrowed definition and pass it to
    /// [`SurveyFlow::replace_definition`].
    pub fn answer(&mut self, question: QuestionId, value: AnswerValue) -> Result<bool, FlowError> {
        self.require_editable("answer")?;
        let q = self
            .visible_questions()
            .into_iter()
            .find(|q| q.id == question)
            .cloned()
            .ok_or(FlowError::QuestionNotVisible(question))?;
        if value.has_answer() {
            validate_answer(&q, &value)?;
        }

        let before = self.selection();
        let declines = q.role == Some(QuestionRole::GmInterest) && !answer_is_yes(&value);
        self.answers.insert(question, value);
        if declines {
            for id in self.definition.contact_question_ids() {
                self.answers.remove(&id);
            }
        }
        Ok(self.selection() != before)
    }

    /// Record an answer to the current question.
    pub fn answer_current(&mut self, value: AnswerValue) -> Result<bool, FlowError> {
        let id = self.current().map(|q| q.id).ok_or(FlowError::NoCurrentQuestion)?;
        self.answer(id, value)
    }

    /// Swap in a re-narrowed definition, keeping answers that still fit.
    ///
    /// Answers to narrowed dropdowns that are no longer offered are dropped.
    pub fn replace_definition(&mut self, definition: SurveyDefinition) {
        self.definition = definition;
        let stale: Vec<QuestionId> = self
            .definition
            .questions
            .iter()
            .filter(|q| q.question_type.has_options() && q.availability != OptionAvailability::Unfiltered)
            .filter(|q| match self.answers.get(&q.id) {
                Some(AnswerValue::Text(s)) => q.option_matching(s).is_none(),
                Some(AnswerValue::Choices(items)) => items.iter().any(|v| q.option_matching(v).is_none()),
                _ => false,
            })
            .map(|q| q.id)
            .collect();
        for id in stale {
            self.answers.remove(&id);
        }
    }

    /// Move forward, or produce the submission due at this point.
    pub fn next(&mut self) -> Result<FlowStep, FlowError> {
        match self.phase {
            FlowPhase::Answering | FlowPhase::Volunteering => {}
            FlowPhase::Submitting | FlowPhase::SubmittingVolunteer => {
                return Err(FlowError::SubmissionInFlight)
            }
            _ => return Err(self.wrong_phase("advance")),
        }

        let current = self.current().cloned().ok_or(FlowError::NoCurrentQuestion)?;
        let answered = self.answers.get(&current.id).is_some_and(AnswerValue::has_answer);
        if current.requires_answer() && !answered {
            return Err(FlowError::AnswerRequired(current.id));
        }

        if self.phase == FlowPhase::Volunteering {
            if self.is_last() {
                return self.attach_step();
            }
            self.cursor += 1;
            return Ok(FlowStep::Advanced);
        }

        let at_recommendation = current.role == Some(QuestionRole::Recommendation) && answered;
        if self.response_id.is_none() && (at_recommendation || self.is_last()) {
            return Ok(self.submit_step(at_recommendation));
        }
        self.cursor += 1;
        Ok(FlowStep::Advanced)
    }

    /// Move back one question.
    pub fn previous(&mut self) -> Result<(), FlowError> {
        self.require_editable("go back")?;
        self.cursor = self.cursor.saturating_sub(1);
        Ok(())
    }

    /// Phase one succeeded.
    pub fn response_created(&mut self, response_id: ResponseId) -> Result<(), FlowError> {
        if self.phase != FlowPhase::Submitting {
            return Err(self.wrong_phase("record a response"));
        }
        self.response_id = Some(response_id);
        self.phase = FlowPhase::CouponOffer { outcome: None };
        self.cursor = 0;
        Ok(())
    }

    /// The in-flight submission failed; the respondent may retry.
    pub fn submission_failed(&mut self) -> Result<(), FlowError> {
        self.phase = match self.phase {
            FlowPhase::Submitting => {
                self.submitted.clear();
                FlowPhase::Answering
            }
            FlowPhase::SubmittingVolunteer => FlowPhase::Volunteering,
            _ => return Err(self.wrong_phase("fail a submission")),
        };
        Ok(())
    }

    /// Record the coupon allocation result for the offer page.
    pub fn coupon_resolved(&mut self, result: CouponOutcome) -> Result<(), FlowError> {
        match &mut self.phase {
            FlowPhase::CouponOffer { outcome } => {
                *outcome = Some(result);
                Ok(())
            }
            _ => Err(self.wrong_phase("show a coupon")),
        }
    }

    /// Branch into the GM volunteer questions from the coupon page.
    pub fn volunteer(&mut self) -> Result<(), FlowError> {
        if !matches!(self.phase, FlowPhase::CouponOffer { .. }) {
            return Err(self.wrong_phase("volunteer"));
        }
        if self.definition.contact_question_ids().is_empty() {
            return Err(FlowError::NoVolunteerQuestions);
        }
        if let Some(q) = self.definition.question_by_role(QuestionRole::GmInterest) {
            self.answers.insert(q.id, AnswerValue::from("yes"));
        }
        self.phase = FlowPhase::Volunteering;
        self.cursor = 0;
        Ok(())
    }

    /// Leave the coupon page without volunteering.
    pub fn finish(&mut self) -> Result<(), FlowError> {
        if !matches!(self.phase, FlowPhase::CouponOffer { .. }) {
            return Err(self.wrong_phase("finish"));
        }
        self.phase = FlowPhase::Completed;
        Ok(())
    }

    /// Volunteer answers were attached.
    pub fn attach_completed(&mut self) -> Result<(), FlowError> {
        if self.phase != FlowPhase::SubmittingVolunteer {
            return Err(self.wrong_phase("complete volunteering"));
        }
        self.phase = FlowPhase::Completed;
        Ok(())
    }

    fn submit_step(&mut self, at_recommendation: bool) -> FlowStep {
        let contact_ids = self.definition.contact_question_ids();
        let mut outgoing: BTreeMap<QuestionId, AnswerValue> = self
            .answers
            .iter()
            .filter(|(id, _)| !contact_ids.contains(*id))
            .map(|(id, v)| (*id, v.clone()))
            .collect();
        if let (Some(m), Some(q)) = (
            &self.preselected,
            self.definition.question_by_role(QuestionRole::Convention),
        ) {
            outgoing
                .entry(q.id)
                .or_insert_with(|| AnswerValue::Text(m.value.clone()));
        }

        let contact = (!at_recommendation && self.wants_to_volunteer())
            .then(|| self.contact())
            .filter(|c| !c.is_blank());

        self.submitted = outgoing
            .iter()
            .filter(|(_, v)| v.has_answer())
            .map(|(id, _)| *id)
            .collect();
        self.phase = FlowPhase::Submitting;
        FlowStep::SubmitResponse {
            answers: expand_answers(&self.definition, &outgoing),
            contact,
        }
    }

    fn attach_step(&mut self) -> Result<FlowStep, FlowError> {
        let response_id = self.response_id.ok_or(FlowError::WrongPhase {
            operation: "attach answers",
            phase: "without a response",
        })?;
        let contact_ids = self.definition.contact_question_ids();
        let outgoing: BTreeMap<QuestionId, AnswerValue> = self
            .answers
            .iter()
            .filter(|(id, _)| !contact_ids.contains(*id) && !self.submitted.contains(*id))
            .map(|(id, v)| (*id, v.clone()))
            .collect();
        let contact = self.contact();
        self.phase = FlowPhase::SubmittingVolunteer;
        Ok(FlowStep::AttachToResponse {
            response_id,
            answers: expand_answers(&self.definition, &outgoing),
            contact,
        })
    }

    fn contact(&self) -> GmContact {
        let field = |role| {
            self.definition
                .question_by_role(role)
                .and_then(|q| self.answers.get(&q.id))
                .and_then(AnswerValue::as_scalar)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        GmContact {
            first_name: field(QuestionRole::GmFirstName),
            last_name: field(QuestionRole::GmLastName),
            email: field(QuestionRole::GmEmail),
        }
    }

    fn wants_to_volunteer(&self) -> bool {
        self.definition
            .question_by_role(QuestionRole::GmInterest)
            .and_then(|q| self.answers.get(&q.id))
            .is_some_and(answer_is_yes)
    }

    fn role_option_id(&self, role: QuestionRole) -> Option<OptionId> {
        let q = self.definition.question_by_role(role)?;
        match self.answers.get(&q.id)? {
            AnswerValue::Text(s) => q.option_matching(s).map(|o| o.id),
            _ => None,
        }
    }

    fn require_editable(&self, operation: &'static str) -> Result<(), FlowError> {
        match self.phase {
            FlowPhase::Answering | FlowPhase::Volunteering => Ok(()),
            _ => Err(self.wrong_phase(operation)),
        }
    }

    fn wrong_phase(&self, operation: &'static str) -> FlowError {
        FlowError::WrongPhase {
            operation,
            phase: self.phase.name(),
        }
    }
}

fn answer_is_yes(value: &AnswerValue) -> bool {
    match value {
        AnswerValue::Text(s) => is_yes(s),
        AnswerValue::Bool(b) => *b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::{narrow, AssociationIndex, GmConvention};
    use crate::identity::AssignmentId;
    use crate::question::QuestionOption;
    use crate::survey::default_survey;
    use chrono::Utc;

    fn qid(flow: &SurveyFlow, role: QuestionRole) -> QuestionId {
        flow.definition().question_by_role(role).unwrap().id
    }

    /// Default survey with two GMs and one adventure.
    fn survey() -> SurveyDefinition {
        let mut def = default_survey();
        for (role, texts, base) in [
            (QuestionRole::GameMaster, vec!["Ana", "Ben"], 10),
            (QuestionRole::Adventure, vec!["Heist"], 20),
        ] {
            let q = def.question_by_role_mut(role).unwrap();
            let question_id = q.id;
            q.options = texts
                .iter()
                .enumerate()
                .map(|(i, t)| QuestionOption {
                    id: OptionId::new(base + i as i64),
                    question_id,
                    option_text: (*t).into(),
                    option_value: t.to_lowercase(),
                    display_order: i as i32 + 1,
                })
                .collect();
        }
        def
    }

    /// Answer everything before the recommendation question.
    fn answer_through_ratings(flow: &mut SurveyFlow) {
        let mut values: Vec<AnswerValue> = vec!["ana".into(), "heist".into(), 5.into(), 4.into()];
        if flow.preselected().is_none() {
            values.insert(0, "gen_con".into());
        }
        for v in values {
            flow.answer_current(v).unwrap();
            assert_eq!(flow.next().unwrap(), FlowStep::Advanced);
        }
        assert_eq!(flow.current().unwrap().role, Some(QuestionRole::Recommendation));
    }

    #[test]
    fn contact_questions_appear_only_after_yes() {
        let mut flow = SurveyFlow::new(survey(), None);
        assert_eq!(flow.visible_questions().len(), 7);

        let interest = qid(&flow, QuestionRole::GmInterest);
        flow.answer(interest, "yes".into()).unwrap();
        assert_eq!(flow.visible_questions().len(), 10);

        let first = qid(&flow, QuestionRole::GmFirstName);
        flow.answer(first, "Ada".into()).unwrap();
        flow.answer(interest, "no".into()).unwrap();
        assert_eq!(flow.visible_questions().len(), 7);
        assert!(flow.answer_for(first).is_none(), "declining clears contact answers");
    }

    #[test]
    fn required_question_blocks_next() {
        let mut flow = SurveyFlow::new(survey(), None);
        let convention = qid(&flow, QuestionRole::Convention);
        assert_eq!(flow.next(), Err(FlowError::AnswerRequired(convention)));
        flow.answer_current("   ".into()).unwrap();
        assert_eq!(flow.next(), Err(FlowError::AnswerRequired(convention)));
        flow.answer_current("gen_con".into()).unwrap();
        assert_eq!(flow.next(), Ok(FlowStep::Advanced));
    }

    #[test]
    fn invalid_answers_are_rejected() {
        let mut flow = SurveyFlow::new(survey(), None);
        let rating = qid(&flow, QuestionRole::GmRating);
        assert!(matches!(flow.answer(rating, 9.into()), Err(FlowError::Invalid(_))));
        let first = qid(&flow, QuestionRole::GmFirstName);
        assert_eq!(
            flow.answer(first, "Ada".into()),
            Err(FlowError::QuestionNotVisible(first))
        );
    }

    #[test]
    fn preselected_convention_is_hidden_and_submitted() {
        let mut flow = SurveyFlow::new(survey(), Some("Gen Con"));
        let convention = qid(&flow, QuestionRole::Convention);
        assert!(flow.visible_questions().iter().all(|q| q.id != convention));
        assert_eq!(flow.selection().convention, Some(OptionId::new(1)));

        answer_through_ratings(&mut flow);
        flow.answer_current(9.into()).unwrap();
        let FlowStep::SubmitResponse { answers, contact } = flow.next().unwrap() else {
            panic!("expected phase-one submission");
        };
        assert!(contact.is_none());
        let conv_row = answers.iter().find(|a| a.question_id == convention).unwrap();
        assert_eq!(conv_row.answer_value.as_deref(), Some("gen_con"));
        assert_eq!(conv_row.answer_text.as_deref(), Some("Gen Con"));
        assert_eq!(answers.len(), 6);
    }

    #[test]
    fn phase_one_fires_at_recommendation_and_guards_double_submit() {
        let mut flow = SurveyFlow::new(survey(), None);
        answer_through_ratings(&mut flow);
        flow.answer_current(10.into()).unwrap();

        let step = flow.next().unwrap();
        assert!(matches!(step, FlowStep::SubmitResponse { .. }));
        assert_eq!(flow.phase(), &FlowPhase::Submitting);
        assert_eq!(flow.next(), Err(FlowError::SubmissionInFlight));

        flow.submission_failed().unwrap();
        assert_eq!(flow.phase(), &FlowPhase::Answering);
        assert!(matches!(flow.next().unwrap(), FlowStep::SubmitResponse { .. }));
    }

    #[test]
    fn volunteer_attaches_to_the_same_response() {
        let mut flow = SurveyFlow::new(survey(), None);
        answer_through_ratings(&mut flow);
        flow.answer_current(8.into()).unwrap();
        let FlowStep::SubmitResponse { answers, .. } = flow.next().unwrap() else {
            panic!("expected phase-one submission");
        };
        let contact_ids = flow.definition().contact_question_ids();
        assert!(answers.iter().all(|a| !contact_ids.contains(&a.question_id)));

        flow.response_created(ResponseId::new(41)).unwrap();
        flow.coupon_resolved(CouponOutcome::Assigned { code: "ABC".into() }).unwrap();
        assert_eq!(
            flow.coupon(),
            Some(&CouponOutcome::Assigned { code: "ABC".into() })
        );

        flow.volunteer().unwrap();
        let visible: Vec<_> = flow.visible_questions().iter().map(|q| q.role).collect();
        assert_eq!(
            visible,
            vec![
                Some(QuestionRole::GmFirstName),
                Some(QuestionRole::GmLastName),
                Some(QuestionRole::GmEmail)
            ]
        );

        for v in ["Ada", "Lovelace"] {
            flow.answer_current(v.into()).unwrap();
            assert_eq!(flow.next().unwrap(), FlowStep::Advanced);
        }
        flow.answer_current("ada@example.com".into()).unwrap();
        let step = flow.next().unwrap();
        let FlowStep::AttachToResponse {
            response_id,
            answers,
            contact,
        } = step
        else {
            panic!("volunteering must attach, not create a response");
        };
        assert_eq!(response_id, ResponseId::new(41));
        assert_eq!(contact.email, "ada@example.com");
        let interest = qid(&flow, QuestionRole::GmInterest);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_id, interest);
        assert_eq!(answers[0].answer_text.as_deref(), Some("yes"));

        flow.attach_completed().unwrap();
        assert_eq!(flow.phase(), &FlowPhase::Completed);
    }

    #[test]
    fn volunteering_reuses_questions_left_after_the_recommendation() {
        let def = survey();
        let mut comments = def
            .question_by_role(QuestionRole::Recommendation)
            .unwrap()
            .clone();
        comments.id = QuestionId::new(50);
        comments.question_text = "Comments".into();
        comments.question_type = crate::question::QuestionType::LongText;
        comments.is_required = false;
        comments.display_order = 11;
        comments.role = None;
        comments.validation_rules = serde_json::json!({});
        let mut questions = def.questions.clone();
        questions.push(comments);
        let mut flow = SurveyFlow::new(SurveyDefinition::new(def.survey, questions), None);

        answer_through_ratings(&mut flow);
        flow.answer_current(9.into()).unwrap();
        let FlowStep::SubmitResponse { answers, .. } = flow.next().unwrap() else {
            panic!("expected phase-one submission");
        };
        assert!(answers.iter().all(|a| a.question_id != QuestionId::new(50)));

        flow.response_created(ResponseId::new(7)).unwrap();
        flow.coupon_resolved(CouponOutcome::Unavailable).unwrap();
        flow.volunteer().unwrap();
        let visible: Vec<&str> = flow
            .visible_questions()
            .iter()
            .map(|q| q.question_text.as_str())
            .collect();
        assert_eq!(visible, ["First name", "Last name", "Email address", "Comments"]);

        for v in ["Ada", "Lovelace", "ada@example.com"] {
            flow.answer_current(v.into()).unwrap();
            assert_eq!(flow.next().unwrap(), FlowStep::Advanced);
        }
        flow.answer_current("great".into()).unwrap();
        let FlowStep::AttachToResponse {
            response_id,
            answers,
            ..
        } = flow.next().unwrap()
        else {
            panic!("volunteering must attach, not create a response");
        };
        assert_eq!(response_id, ResponseId::new(7));
        let interest = qid(&flow, QuestionRole::GmInterest);
        let sent: Vec<(QuestionId, Option<&str>)> = answers
            .iter()
            .map(|a| (a.question_id, a.answer_text.as_deref()))
            .collect();
        assert_eq!(
            sent,
            [(interest, Some("yes")), (QuestionId::new(50), Some("great"))]
        );
    }

    #[test]
    fn finish_from_coupon_page() {
        let mut flow = SurveyFlow::new(survey(), None);
        answer_through_ratings(&mut flow);
        flow.answer_current(7.into()).unwrap();
        flow.next().unwrap();
        flow.response_created(ResponseId::new(1)).unwrap();
        flow.coupon_resolved(CouponOutcome::Unavailable).unwrap();
        assert_eq!(flow.coupon(), Some(&CouponOutcome::Unavailable));
        flow.finish().unwrap();
        assert!(flow.volunteer().is_err());
        assert!(flow.visible_questions().is_empty());
    }

    #[test]
    fn survey_without_recommendation_submits_at_the_end_with_contact() {
        let mut def = survey();
        def.questions
            .retain(|q| q.role != Some(QuestionRole::Recommendation));
        let mut flow = SurveyFlow::new(def, Some("gen_con"));
        let values: Vec<AnswerValue> = vec![
            "ana".into(),
            "heist".into(),
            5.into(),
            5.into(),
            "yes".into(),
            "Ada".into(),
            "Lovelace".into(),
        ];
        for v in values {
            flow.answer_current(v).unwrap();
            assert_eq!(flow.next().unwrap(), FlowStep::Advanced);
        }
        assert!(flow.is_last());
        flow.answer_current("ada@example.com".into()).unwrap();
        let FlowStep::SubmitResponse { answers, contact } = flow.next().unwrap() else {
            panic!("expected final submission");
        };
        assert_eq!(contact.unwrap().last_name, "Lovelace");
        let contact_ids = flow.definition().contact_question_ids();
        assert!(answers.iter().all(|a| !contact_ids.contains(&a.question_id)));
    }

    #[test]
    fn replacing_definition_drops_answers_no_longer_offered() {
        let mut flow = SurveyFlow::new(survey(), None);
        flow.answer_current("gen_con".into()).unwrap();
        flow.next().unwrap();
        let changed = flow.answer_current("ben".into()).unwrap();
        assert!(changed);

        let index = AssociationIndex::new(
            &[GmConvention {
                id: AssignmentId::new(1),
                gm_option_id: OptionId::new(10),
                convention_option_id: OptionId::new(1),
                created_at: Utc::now(),
            }],
            &[],
        );
        let narrowed = narrow(survey(), &index, flow.selection());
        flow.replace_definition(narrowed);

        let gm = qid(&flow, QuestionRole::GameMaster);
        assert!(flow.answer_for(gm).is_none());
        assert_eq!(flow.selection().gm, None);
        let adv = flow.definition().question_by_role(QuestionRole::Adventure).unwrap();
        assert_eq!(adv.availability, OptionAvailability::Unassigned);
    }
}
