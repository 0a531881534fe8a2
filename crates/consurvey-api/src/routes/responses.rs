//! # Response Administration and Export
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/v1/admin/responses` | Newest responses with answers |
//! | DELETE | `/v1/admin/responses` | Delete all responses and answers |
//! | GET | `/v1/admin/export/responses.csv` | Responses as CSV |
//! | GET | `/v1/admin/export/gm-interest.csv` | GM volunteers as CSV |
//! | GET | `/v1/admin/gm-interest` | GM volunteers |
//! | POST | `/v1/admin/gm-interest/reprocess` | Rebuild GM interest from answers |
//! | POST | `/v1/admin/gm-interest/remove-answers` | Delete contact answers |

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use consurvey_core::export::{gm_interest_csv, responses_csv};
use consurvey_core::{GmInterestRow, ResponseWithAnswers, SurveyId};

use crate::error::AppError;
use crate::extractors::extract_query;
use crate::routes::options::SurveyQuery;
use crate::state::AppState;
use crate::store::{ClearedResponses, ReprocessReport};

const DEFAULT_LIMIT: u32 = 1000;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResponseListQuery {
    /// Defaults to the configured survey.
    pub survey_id: Option<SurveyId>,
    /// Defaults to 1000.
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RemovedAnswers {
    pub deleted: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/admin/responses",
            get(list_responses).delete(clear_responses),
        )
        .route("/v1/admin/export/responses.csv", get(export_responses))
        .route("/v1/admin/export/gm-interest.csv", get(export_gm_interest))
        .route("/v1/admin/gm-interest", get(list_gm_interest))
        .route("/v1/admin/gm-interest/reprocess", post(reprocess_gm_interest))
        .route(
            "/v1/admin/gm-interest/remove-answers",
            post(remove_contact_answers),
        )
}

fn csv_attachment(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

/// GET /v1/admin/responses
#[utoipa::path(
    get,
    path = "/v1/admin/responses",
    params(ResponseListQuery),
    responses(
        (status = 200, description = "Responses newest first", body = [ResponseWithAnswers]),
    ),
    tag = "admin"
)]
async fn list_responses(
    State(state): State<AppState>,
    query: Result<Query<ResponseListQuery>, QueryRejection>,
) -> Result<Json<Vec<ResponseWithAnswers>>, AppError> {
    let query = extract_query(query)?;
    let survey_id = query.survey_id.unwrap_or(state.config.default_survey_id);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(state.store.list_responses(survey_id, limit).await?))
}

/// DELETE /v1/admin/responses
#[utoipa::path(
    delete,
    path = "/v1/admin/responses",
    responses(
        (status = 200, description = "Rows deleted", body = ClearedResponses),
    ),
    tag = "admin"
)]
async fn clear_responses(State(state): State<AppState>) -> Result<Json<ClearedResponses>, AppError> {
    let cleared = state.store.clear_responses().await?;
    tracing::warn!(
        responses = cleared.responses,
        answers = cleared.answers,
        "all survey responses deleted"
    );
    Ok(Json(cleared))
}

/// GET /v1/admin/export/responses.csv
#[utoipa::path(
    get,
    path = "/v1/admin/export/responses.csv",
    params(SurveyQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
    ),
    tag = "admin"
)]
async fn export_responses(
    State(state): State<AppState>,
    query: Result<Query<SurveyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let survey_id = extract_query(query)?.resolve(&state);
    let definition = state.store.definition(survey_id).await?;
    let responses = state.store.list_responses(survey_id, u32::MAX).await?;
    let csv = responses_csv(&definition.questions, &responses);
    Ok(csv_attachment("responses.csv", csv))
}

/// GET /v1/admin/export/gm-interest.csv
#[utoipa::path(
    get,
    path = "/v1/admin/export/gm-interest.csv",
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
    ),
    tag = "admin"
)]
async fn export_gm_interest(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let rows = state.store.list_gm_interest().await?;
    Ok(csv_attachment("gm-interest.csv", gm_interest_csv(&rows)))
}

/// GET /v1/admin/gm-interest
#[utoipa::path(
    get,
    path = "/v1/admin/gm-interest",
    responses(
        (status = 200, description = "Volunteers by last then first name", body = [GmInterestRow]),
    ),
    tag = "admin"
)]
async fn list_gm_interest(State(state): State<AppState>) -> Result<Json<Vec<GmInterestRow>>, AppError> {
    Ok(Json(state.store.list_gm_interest().await?))
}

/// POST /v1/admin/gm-interest/reprocess
#[utoipa::path(
    post,
    path = "/v1/admin/gm-interest/reprocess",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Records rebuilt", body = ReprocessReport),
        (status = 422, description = "Survey has no contact questions", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn reprocess_gm_interest(
    State(state): State<AppState>,
    query: Result<Query<SurveyQuery>, QueryRejection>,
) -> Result<Json<ReprocessReport>, AppError> {
    let survey_id = extract_query(query)?.resolve(&state);
    Ok(Json(state.store.reprocess_gm_interest(survey_id).await?))
}

/// POST /v1/admin/gm-interest/remove-answers
#[utoipa::path(
    post,
    path = "/v1/admin/gm-interest/remove-answers",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Contact answers deleted", body = RemovedAnswers),
    ),
    tag = "admin"
)]
async fn remove_contact_answers(
    State(state): State<AppState>,
    query: Result<Query<SurveyQuery>, QueryRejection>,
) -> Result<Json<RemovedAnswers>, AppError> {
    let survey_id = extract_query(query)?.resolve(&state);
    let deleted = state.store.remove_contact_answers(survey_id).await?;
    tracing::info!(survey_id = %survey_id, deleted, "GM contact answers removed");
    Ok(Json(RemovedAnswers { deleted }))
}
