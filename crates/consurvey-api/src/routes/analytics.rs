//! # Rating Analytics
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/v1/admin/ratings` | Rating distributions, optionally per convention |
//! | GET | `/v1/admin/conventions` | Conventions found in answers |
//! | GET | `/v1/admin/adventures` | Configured and answered adventure names |
//!
//! Everything here is computed from stored answers on each call.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use consurvey_core::analytics::{
    adventure_names, convention_summaries, rating_summary, ConventionSummary,
};
use consurvey_core::{
    Answer, ConventionFilter, QuestionId, QuestionOption, QuestionRole, RatingSummary,
    SurveyDefinition, SurveyId,
};

use crate::error::AppError;
use crate::extractors::extract_query;
use crate::routes::options::SurveyQuery;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RatingsQuery {
    /// Convention value or display text. `all` or absent means every response.
    pub convention: Option<String>,
    /// Defaults to the configured survey.
    pub survey_id: Option<SurveyId>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/ratings", get(ratings))
        .route("/v1/admin/conventions", get(conventions))
        .route("/v1/admin/adventures", get(adventures))
}

/// Stored answers to the questions tagged with `roles`.
async fn answers_for_roles(
    state: &AppState,
    definition: &SurveyDefinition,
    roles: &[QuestionRole],
) -> Result<Vec<Answer>, AppError> {
    let ids: Vec<QuestionId> = roles
        .iter()
        .filter_map(|role| definition.question_by_role(*role))
        .map(|q| q.id)
        .collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(state.store.answers_for_questions(&ids).await?)
}

fn role_options(definition: &SurveyDefinition, role: QuestionRole) -> &[QuestionOption] {
    definition
        .question_by_role(role)
        .map(|q| q.options.as_slice())
        .unwrap_or(&[])
}

/// GET /v1/admin/ratings
#[utoipa::path(
    get,
    path = "/v1/admin/ratings",
    params(RatingsQuery),
    responses(
        (status = 200, description = "Zero-filled rating distributions", body = RatingSummary),
        (status = 404, description = "Survey not found", body = crate::error::ErrorBody),
    ),
    tag = "analytics"
)]
async fn ratings(
    State(state): State<AppState>,
    query: Result<Query<RatingsQuery>, QueryRejection>,
) -> Result<Json<RatingSummary>, AppError> {
    let query = extract_query(query)?;
    let survey_id = query.survey_id.unwrap_or(state.config.default_survey_id);
    let definition = state.store.definition(survey_id).await?;
    let answers = answers_for_roles(
        &state,
        &definition,
        &[
            QuestionRole::Convention,
            QuestionRole::GmRating,
            QuestionRole::AdventureRating,
            QuestionRole::Recommendation,
        ],
    )
    .await?;
    let filter = ConventionFilter::parse(query.convention.as_deref());
    Ok(Json(rating_summary(&definition, &answers, &filter)))
}

/// GET /v1/admin/conventions
#[utoipa::path(
    get,
    path = "/v1/admin/conventions",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Conventions sorted by display name", body = [ConventionSummary]),
        (status = 404, description = "Survey not found", body = crate::error::ErrorBody),
    ),
    tag = "analytics"
)]
async fn conventions(
    State(state): State<AppState>,
    query: Result<Query<SurveyQuery>, QueryRejection>,
) -> Result<Json<Vec<ConventionSummary>>, AppError> {
    let survey_id = extract_query(query)?.resolve(&state);
    let definition = state.store.definition(survey_id).await?;
    let answers = answers_for_roles(&state, &definition, &[QuestionRole::Convention]).await?;
    let summaries = convention_summaries(
        role_options(&definition, QuestionRole::Convention),
        answers.iter().filter_map(|a| a.matching_value()),
    );
    Ok(Json(summaries))
}

/// GET /v1/admin/adventures
#[utoipa::path(
    get,
    path = "/v1/admin/adventures",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Adventure names, case-insensitively sorted", body = [String]),
        (status = 404, description = "Survey not found", body = crate::error::ErrorBody),
    ),
    tag = "analytics"
)]
async fn adventures(
    State(state): State<AppState>,
    query: Result<Query<SurveyQuery>, QueryRejection>,
) -> Result<Json<Vec<String>>, AppError> {
    let survey_id = extract_query(query)?.resolve(&state);
    let definition = state.store.definition(survey_id).await?;
    let answers = answers_for_roles(&state, &definition, &[QuestionRole::Adventure]).await?;

    // Answered option values are shown under the option's text.
    let answered: Vec<&str> = answers
        .iter()
        .filter_map(|a| a.matching_value())
        .map(|raw| {
            definition
                .role_option_matching(QuestionRole::Adventure, raw)
                .map(|o| o.option_text.as_str())
                .unwrap_or(raw)
        })
        .collect();
    Ok(Json(adventure_names(
        role_options(&definition, QuestionRole::Adventure),
        answered,
    )))
}
