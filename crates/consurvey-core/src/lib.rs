//! # consurvey-core — Domain Model for the Convention Survey Stack
//!
//! Pure domain logic with no I/O:
//!
//! - **Questions and options** ([`question`], [`survey`]): question types,
//!   semantic roles, stable option values, answer validation.
//! - **Associations** ([`association`]): the GM × convention × adventure
//!   assignment model and the dropdown narrowing it drives.
//! - **Coupons** ([`coupon`]): inventory lifecycle and allocation
//!   eligibility.
//! - **Flow** ([`flow`]): the conditional multi-step questionnaire with its
//!   two-phase submission and GM volunteer branch.
//! - **Analytics and export** ([`analytics`], [`export`]).
//!
//! Persistence and HTTP live in `consurvey-api`; this crate only defines
//! what the stored records mean.

pub mod analytics;
pub mod answer;
pub mod association;
pub mod coupon;
pub mod error;
pub mod export;
pub mod flow;
pub mod gm_interest;
pub mod identity;
pub mod question;
pub mod survey;

pub use analytics::{ConventionFilter, RatingDistribution, RatingSummary};
pub use answer::{Answer, AnswerInput, AnswerValue, RespondentInfo, ResponseWithAnswers, SurveyResponse};
pub use association::{AssociationIndex, GmAdventure, GmConvention, NarrowedOptions, Selection};
pub use coupon::{CouponCode, CouponDelivery, CouponOutcome, CouponStatus, ImportReport, MarkAction};
pub use error::{AssociationError, CouponError, FlowError, SurveyError, ValidationError};
pub use flow::{FlowPhase, FlowStep, SurveyFlow};
pub use gm_interest::{GmContact, GmInterest, GmInterestRow};
pub use identity::{
    AnswerId, AssignmentId, CouponId, DeliveryId, GmInterestId, OptionId, QuestionId, ResponseId,
    SurveyId,
};
pub use question::{OptionAvailability, Question, QuestionOption, QuestionRole, QuestionType};
pub use survey::{ConventionMatch, Survey, SurveyDefinition};
