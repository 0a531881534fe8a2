//! # Public Survey API
//!
//! The endpoints an attendee's questionnaire talks to.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/v1/surveys/:id` | Narrowed survey definition |
//! | GET | `/v1/surveys/:id/gms` | GM options for a convention |
//! | GET | `/v1/surveys/:id/adventures` | Adventure options for a GM |
//! | POST | `/v1/surveys/:id/responses` | Phase-one submission |
//! | POST | `/v1/surveys/:id/responses/:response_id/answers` | Attach answers to a response |
//! | POST | `/v1/gm-interest` | Record GM volunteer contact details |
//!
//! GM contact answers never go through the response endpoints; they are
//! stored as a GM interest record instead.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use consurvey_core::association::{narrow, narrow_adventures, narrow_gms};
use consurvey_core::{
    AnswerInput, ConventionMatch, GmContact, GmInterest, NarrowedOptions, OptionId, Question,
    RespondentInfo, ResponseId, Selection, Survey, SurveyDefinition, SurveyId,
};

use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, Validate};
use crate::state::AppState;
use crate::store::NewResponse;

/// Query parameters shared by the definition and narrowing endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SelectionQuery {
    /// Convention as a raw value or display text, e.g. from a QR code link.
    pub convention: Option<String>,
    /// Selected convention option. Takes precedence over `convention`.
    pub convention_option_id: Option<OptionId>,
    /// Selected GM option.
    pub gm_option_id: Option<OptionId>,
}

/// A survey definition narrowed to the caller's selection.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SurveyView {
    pub survey: Survey,
    pub questions: Vec<Question>,
    /// How the `convention` parameter resolved, when one was given.
    pub preselected_convention: Option<ConventionMatch>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitResponseRequest {
    pub answers: Vec<AnswerInput>,
    #[serde(default)]
    pub respondent: Option<RespondentInfo>,
}

impl Validate for SubmitResponseRequest {
    fn validate(&self) -> Result<(), String> {
        if self.answers.is_empty() {
            return Err("answers must not be empty".to_string());
        }
        validate_rows(&self.answers)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponseResponse {
    pub response_id: ResponseId,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachAnswersRequest {
    pub answers: Vec<AnswerInput>,
}

impl Validate for AttachAnswersRequest {
    fn validate(&self) -> Result<(), String> {
        validate_rows(&self.answers)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttachAnswersResponse {
    /// Rows written. Questions already answered are skipped.
    pub inserted: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GmInterestRequest {
    pub response_id: ResponseId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl GmInterestRequest {
    fn contact(&self) -> GmContact {
        GmContact {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

impl Validate for GmInterestRequest {
    fn validate(&self) -> Result<(), String> {
        self.contact().validate().map_err(|e| e.to_string())
    }
}

fn validate_rows(rows: &[AnswerInput]) -> Result<(), String> {
    match rows
        .iter()
        .find(|r| r.matching_value().map_or(true, |v| v.trim().is_empty()))
    {
        Some(row) => Err(format!("answer to question {} is empty", row.question_id)),
        None => Ok(()),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/surveys/:id", get(get_survey))
        .route("/v1/surveys/:id/gms", get(list_gms))
        .route("/v1/surveys/:id/adventures", get(list_adventures))
        .route("/v1/surveys/:id/responses", post(submit_response))
        .route(
            "/v1/surveys/:id/responses/:response_id/answers",
            post(attach_answers),
        )
        .route("/v1/gm-interest", post(submit_gm_interest))
}

// -- Helpers ----------------------------------------------------------------

/// Load an active survey. Inactive surveys are reported as missing.
async fn active_definition(state: &AppState, id: SurveyId) -> Result<SurveyDefinition, AppError> {
    let definition = state.store.definition(id).await?;
    if !definition.survey.is_active {
        return Err(AppError::not_found(format!("survey {id}")));
    }
    Ok(definition)
}

/// The selected convention option: the explicit id, else the raw value
/// resolved against the option list.
fn selected_convention(
    definition: &SurveyDefinition,
    query: &SelectionQuery,
) -> (Option<OptionId>, Option<ConventionMatch>) {
    let resolved = query
        .convention
        .as_deref()
        .and_then(|raw| definition.resolve_convention(raw));
    let option = query
        .convention_option_id
        .or_else(|| resolved.as_ref().and_then(|m| m.option_id));
    (option, resolved)
}

fn reject_contact_answers(
    definition: &SurveyDefinition,
    rows: &[AnswerInput],
) -> Result<(), AppError> {
    let contact = definition.contact_question_ids();
    match rows.iter().find(|r| contact.contains(&r.question_id)) {
        Some(row) => Err(AppError::Validation(format!(
            "question {} collects GM contact details; submit them to /v1/gm-interest",
            row.question_id
        ))),
        None => Ok(()),
    }
}

/// Check each row's value against its question. Rows for questions outside
/// this survey are left to the store, which refuses them.
fn check_answer_values(
    definition: &SurveyDefinition,
    rows: &[AnswerInput],
) -> Result<(), AppError> {
    for row in rows {
        if let Some(question) = definition.question(row.question_id) {
            row.validate_for(question)?;
        }
    }
    Ok(())
}

fn first_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// -- Handlers ---------------------------------------------------------------

/// GET /v1/surveys/:id
#[utoipa::path(
    get,
    path = "/v1/surveys/{id}",
    params(("id" = i64, Path, description = "Survey ID"), SelectionQuery),
    responses(
        (status = 200, description = "Survey definition", body = SurveyView),
        (status = 404, description = "Survey missing or inactive", body = crate::error::ErrorBody),
    ),
    tag = "surveys"
)]
async fn get_survey(
    State(state): State<AppState>,
    Path(id): Path<SurveyId>,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> Result<Json<SurveyView>, AppError> {
    let query = extract_query(query)?;
    let definition = active_definition(&state, id).await?;
    let (convention, preselected) = selected_convention(&definition, &query);
    let index = state.store.association_index().await?;

    let narrowed = narrow(
        definition,
        &index,
        Selection {
            convention,
            gm: query.gm_option_id,
        },
    );
    Ok(Json(SurveyView {
        survey: narrowed.survey,
        questions: narrowed.questions,
        preselected_convention: preselected,
    }))
}

/// GET /v1/surveys/:id/gms
#[utoipa::path(
    get,
    path = "/v1/surveys/{id}/gms",
    params(("id" = i64, Path, description = "Survey ID"), SelectionQuery),
    responses(
        (status = 200, description = "GM options for the convention", body = NarrowedOptions),
        (status = 404, description = "Survey missing or inactive", body = crate::error::ErrorBody),
    ),
    tag = "surveys"
)]
async fn list_gms(
    State(state): State<AppState>,
    Path(id): Path<SurveyId>,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> Result<Json<NarrowedOptions>, AppError> {
    let query = extract_query(query)?;
    let definition = active_definition(&state, id).await?;
    let (convention, _) = selected_convention(&definition, &query);
    let index = state.store.association_index().await?;
    Ok(Json(narrow_gms(&definition, &index, convention)))
}

/// GET /v1/surveys/:id/adventures
#[utoipa::path(
    get,
    path = "/v1/surveys/{id}/adventures",
    params(("id" = i64, Path, description = "Survey ID"), SelectionQuery),
    responses(
        (status = 200, description = "Adventure options for the GM", body = NarrowedOptions),
        (status = 404, description = "Survey missing or inactive", body = crate::error::ErrorBody),
    ),
    tag = "surveys"
)]
async fn list_adventures(
    State(state): State<AppState>,
    Path(id): Path<SurveyId>,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> Result<Json<NarrowedOptions>, AppError> {
    let query = extract_query(query)?;
    let definition = active_definition(&state, id).await?;
    let (convention, _) = selected_convention(&definition, &query);
    let index = state.store.association_index().await?;
    Ok(Json(narrow_adventures(
        &definition,
        &index,
        query.gm_option_id,
        convention,
    )))
}

/// POST /v1/surveys/:id/responses
#[utoipa::path(
    post,
    path = "/v1/surveys/{id}/responses",
    params(("id" = i64, Path, description = "Survey ID")),
    request_body = SubmitResponseRequest,
    responses(
        (status = 201, description = "Response stored", body = SubmitResponseResponse),
        (status = 404, description = "Survey missing or inactive", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown question, invalid value or contact answer", body = crate::error::ErrorBody),
    ),
    tag = "surveys"
)]
async fn submit_response(
    State(state): State<AppState>,
    Path(id): Path<SurveyId>,
    headers: HeaderMap,
    body: Result<Json<SubmitResponseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponseResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let definition = active_definition(&state, id).await?;
    reject_contact_answers(&definition, &req.answers)?;
    check_answer_values(&definition, &req.answers)?;

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let response_id = state
        .store
        .create_response(NewResponse {
            survey_id: id,
            respondent: req.respondent.unwrap_or_default(),
            ip_address: first_forwarded_hop(&headers),
            user_agent,
            answers: req.answers,
        })
        .await?;

    tracing::info!(survey_id = %id, response_id = %response_id, "survey response submitted");
    Ok((StatusCode::CREATED, Json(SubmitResponseResponse { response_id })))
}

/// POST /v1/surveys/:id/responses/:response_id/answers
#[utoipa::path(
    post,
    path = "/v1/surveys/{id}/responses/{response_id}/answers",
    params(
        ("id" = i64, Path, description = "Survey ID"),
        ("response_id" = i64, Path, description = "Response ID"),
    ),
    request_body = AttachAnswersRequest,
    responses(
        (status = 200, description = "Answers attached", body = AttachAnswersResponse),
        (status = 404, description = "Survey inactive or response not in this survey", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid value or contact answer", body = crate::error::ErrorBody),
    ),
    tag = "surveys"
)]
async fn attach_answers(
    State(state): State<AppState>,
    Path((id, response_id)): Path<(SurveyId, ResponseId)>,
    body: Result<Json<AttachAnswersRequest>, JsonRejection>,
) -> Result<Json<AttachAnswersResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let definition = active_definition(&state, id).await?;
    reject_contact_answers(&definition, &req.answers)?;
    check_answer_values(&definition, &req.answers)?;

    let inserted = state
        .store
        .attach_answers(id, response_id, &req.answers)
        .await?;
    tracing::debug!(response_id = %response_id, inserted, "answers attached");
    Ok(Json(AttachAnswersResponse { inserted }))
}

/// POST /v1/gm-interest
#[utoipa::path(
    post,
    path = "/v1/gm-interest",
    request_body = GmInterestRequest,
    responses(
        (status = 200, description = "Contact recorded", body = GmInterest),
        (status = 404, description = "Response not found", body = crate::error::ErrorBody),
        (status = 422, description = "Missing name or invalid email", body = crate::error::ErrorBody),
    ),
    tag = "surveys"
)]
async fn submit_gm_interest(
    State(state): State<AppState>,
    body: Result<Json<GmInterestRequest>, JsonRejection>,
) -> Result<Json<GmInterest>, AppError> {
    let req = extract_validated_json(body)?;
    let record = state
        .store
        .upsert_gm_interest(req.response_id, &req.contact())
        .await?;
    tracing::info!(response_id = %req.response_id, "GM interest recorded");
    Ok(Json(record))
}
