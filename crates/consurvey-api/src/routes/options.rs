//! # Question and Option Administration
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/v1/admin/questions` | Questions with their options |
//! | POST | `/v1/admin/options` | Append an option |
//! | PUT | `/v1/admin/options/:id` | Rename an option |
//! | DELETE | `/v1/admin/options/:id` | Delete an option |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use consurvey_core::{OptionId, Question, QuestionId, QuestionOption, SurveyId};

use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, Validate};
use crate::state::AppState;

/// Selects the survey an admin endpoint works on.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SurveyQuery {
    /// Defaults to the configured survey.
    pub survey_id: Option<SurveyId>,
}

impl SurveyQuery {
    pub(crate) fn resolve(&self, state: &AppState) -> SurveyId {
        self.survey_id.unwrap_or(state.config.default_survey_id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOptionRequest {
    pub question_id: QuestionId,
    pub option_text: String,
}

impl Validate for CreateOptionRequest {
    fn validate(&self) -> Result<(), String> {
        if self.option_text.trim().is_empty() {
            return Err("option_text must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOptionRequest {
    pub option_text: String,
}

impl Validate for UpdateOptionRequest {
    fn validate(&self) -> Result<(), String> {
        if self.option_text.trim().is_empty() {
            return Err("option_text must not be empty".to_string());
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/questions", get(list_questions))
        .route("/v1/admin/options", post(create_option))
        .route("/v1/admin/options/:id", put(update_option).delete(delete_option))
}

/// GET /v1/admin/questions
#[utoipa::path(
    get,
    path = "/v1/admin/questions",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Questions in display order", body = [Question]),
        (status = 404, description = "Survey not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_questions(
    State(state): State<AppState>,
    query: Result<Query<SurveyQuery>, QueryRejection>,
) -> Result<Json<Vec<Question>>, AppError> {
    let survey_id = extract_query(query)?.resolve(&state);
    let definition = state.store.definition(survey_id).await?;
    Ok(Json(definition.questions))
}

/// POST /v1/admin/options
#[utoipa::path(
    post,
    path = "/v1/admin/options",
    request_body = CreateOptionRequest,
    responses(
        (status = 201, description = "Option created", body = QuestionOption),
        (status = 404, description = "Question not found", body = crate::error::ErrorBody),
        (status = 409, description = "Duplicate option value", body = crate::error::ErrorBody),
        (status = 422, description = "Question type has no options", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn create_option(
    State(state): State<AppState>,
    body: Result<Json<CreateOptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QuestionOption>), AppError> {
    let req = extract_validated_json(body)?;
    let option = state
        .store
        .create_option(req.question_id, &req.option_text)
        .await?;
    tracing::info!(question_id = %req.question_id, value = %option.option_value, "option created");
    Ok((StatusCode::CREATED, Json(option)))
}

/// PUT /v1/admin/options/:id
#[utoipa::path(
    put,
    path = "/v1/admin/options/{id}",
    params(("id" = i64, Path, description = "Option ID")),
    request_body = UpdateOptionRequest,
    responses(
        (status = 200, description = "Option renamed", body = QuestionOption),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_option(
    State(state): State<AppState>,
    Path(id): Path<OptionId>,
    body: Result<Json<UpdateOptionRequest>, JsonRejection>,
) -> Result<Json<QuestionOption>, AppError> {
    let req = extract_validated_json(body)?;
    let option = state.store.update_option(id, &req.option_text).await?;
    Ok(Json(option))
}

/// DELETE /v1/admin/options/:id
#[utoipa::path(
    delete,
    path = "/v1/admin/options/{id}",
    params(("id" = i64, Path, description = "Option ID")),
    responses(
        (status = 204, description = "Deleted with its assignments"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_option(
    State(state): State<AppState>,
    Path(id): Path<OptionId>,
) -> Result<StatusCode, AppError> {
    state.store.delete_option(id).await?;
    tracing::info!(option_id = %id, "option deleted");
    Ok(StatusCode::NO_CONTENT)
}
