//! # Error Hierarchy
//!
//! Structured error types for the survey domain, built with `thiserror`.
//! Each subsystem owns its variants; [`SurveyError`] wraps them for callers
//! that do not care which rule was broken.

use thiserror::Error;

use crate::identity::{OptionId, QuestionId};

/// Top-level error type for the survey domain.
#[derive(Error, Debug)]
pub enum SurveyError {
    /// Input failed a domain rule.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Survey flow operation attempted in the wrong phase.
    #[error("flow error: {0}")]
    Flow(#[from] FlowError),

    /// GM/convention/adventure assignment rule violated.
    #[error("association error: {0}")]
    Association(#[from] AssociationError),

    /// Coupon state transition rejected.
    #[error("coupon error: {0}")]
    Coupon(#[from] CouponError),
}

/// Errors from validating domain primitives and answers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Option text was empty once trimmed.
    #[error("option text must not be empty")]
    EmptyOptionText,

    /// A coupon code was empty once trimmed.
    #[error("coupon code must not be empty")]
    EmptyCouponCode,

    /// Unknown `question_type` string.
    #[error("unknown question type: {0:?}")]
    UnknownQuestionType(String),

    /// Unknown `role` string.
    #[error("unknown question role: {0:?}")]
    UnknownQuestionRole(String),

    /// Unknown coupon status string.
    #[error("unknown coupon status: {0:?}")]
    UnknownCouponStatus(String),

    /// Unknown mark action (expected `copied` or `emailed`).
    #[error("invalid action {0:?}: expected \"copied\" or \"emailed\"")]
    UnknownMarkAction(String),

    /// Email address without a local part, `@`, or domain.
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    /// A required contact field is blank.
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// An answer does not fit its question.
    #[error("invalid answer for question {question}: {reason}")]
    InvalidAnswer {
        /// The question being answered.
        question: QuestionId,
        /// What was wrong with the value.
        reason: String,
    },

    /// The question does not belong to the survey.
    #[error("question {0} does not belong to this survey")]
    UnknownQuestion(QuestionId),

    /// The question type does not carry options.
    #[error("question {0} does not accept options")]
    OptionsNotSupported(QuestionId),
}

/// Errors from driving the survey flow state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Tried to leave a required question without an answer.
    #[error("question {0} requires an answer")]
    AnswerRequired(QuestionId),

    /// A submission is already in flight.
    #[error("a submission is already in progress")]
    SubmissionInFlight,

    /// The operation does not apply in the current phase.
    #[error("cannot {operation} while {phase}")]
    WrongPhase {
        /// The attempted operation.
        operation: &'static str,
        /// The current phase name.
        phase: &'static str,
    },

    /// The question is not visible in the current phase.
    #[error("question {0} is not part of the current step")]
    QuestionNotVisible(QuestionId),

    /// The survey has no GM contact questions to volunteer with.
    #[error("this survey has no GM volunteer questions")]
    NoVolunteerQuestions,

    /// No question is under the cursor.
    #[error("no question to answer")]
    NoCurrentQuestion,

    /// Answer failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Errors from GM/convention/adventure assignment rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssociationError {
    /// A gm_adventures row needs its (gm, convention) pair assigned first.
    #[error("GM option {gm} is not assigned to convention option {convention}")]
    MissingConventionAssignment {
        /// GM option id.
        gm: OptionId,
        /// Convention option id.
        convention: OptionId,
    },

    /// The option does not belong to the question with the expected role.
    #[error("option {option} is not a {expected} option")]
    WrongOptionRole {
        /// The offending option id.
        option: OptionId,
        /// Role name the option should have had.
        expected: &'static str,
    },
}

/// Errors from coupon state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    /// Expired codes cannot be redeemed.
    #[error("coupon code {0} has expired")]
    Expired(String),
}
