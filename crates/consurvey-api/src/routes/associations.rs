//! # GM Assignment Administration
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/v1/admin/gm-conventions` | List GM/convention pairs |
//! | POST | `/v1/admin/gm-conventions` | Assign a GM to a convention |
//! | DELETE | `/v1/admin/gm-conventions/:id` | Remove a pair and its adventures |
//! | GET | `/v1/admin/gm-adventures` | List GM/convention/adventure rows |
//! | POST | `/v1/admin/gm-adventures` | Record an adventure for a pair |
//! | DELETE | `/v1/admin/gm-adventures/:id` | Remove an adventure row |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use consurvey_core::{AssignmentId, GmAdventure, GmConvention, OptionId};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGmConventionRequest {
    pub gm_option_id: OptionId,
    pub convention_option_id: OptionId,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGmAdventureRequest {
    pub gm_option_id: OptionId,
    pub convention_option_id: OptionId,
    pub adventure_option_id: OptionId,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/admin/gm-conventions",
            get(list_gm_conventions).post(create_gm_convention),
        )
        .route("/v1/admin/gm-conventions/:id", delete(delete_gm_convention))
        .route(
            "/v1/admin/gm-adventures",
            get(list_gm_adventures).post(create_gm_adventure),
        )
        .route("/v1/admin/gm-adventures/:id", delete(delete_gm_adventure))
}

/// GET /v1/admin/gm-conventions
#[utoipa::path(
    get,
    path = "/v1/admin/gm-conventions",
    responses((status = 200, description = "All pairs", body = [GmConvention])),
    tag = "admin"
)]
async fn list_gm_conventions(
    State(state): State<AppState>,
) -> Result<Json<Vec<GmConvention>>, AppError> {
    Ok(Json(state.store.list_gm_conventions().await?))
}

/// POST /v1/admin/gm-conventions
#[utoipa::path(
    post,
    path = "/v1/admin/gm-conventions",
    request_body = CreateGmConventionRequest,
    responses(
        (status = 201, description = "Pair created", body = GmConvention),
        (status = 409, description = "Already assigned", body = crate::error::ErrorBody),
        (status = 422, description = "Ids are not GM/convention options", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn create_gm_convention(
    State(state): State<AppState>,
    body: Result<Json<CreateGmConventionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GmConvention>), AppError> {
    let req = extract_json(body)?;
    let row = state
        .store
        .create_gm_convention(req.gm_option_id, req.convention_option_id)
        .await?;
    tracing::info!(
        gm = %row.gm_option_id,
        convention = %row.convention_option_id,
        "GM assigned to convention"
    );
    Ok((StatusCode::CREATED, Json(row)))
}

/// DELETE /v1/admin/gm-conventions/:id
#[utoipa::path(
    delete,
    path = "/v1/admin/gm-conventions/{id}",
    params(("id" = i64, Path, description = "Assignment ID")),
    responses(
        (status = 204, description = "Deleted with its adventures"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_gm_convention(
    State(state): State<AppState>,
    Path(id): Path<AssignmentId>,
) -> Result<StatusCode, AppError> {
    state.store.delete_gm_convention(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/admin/gm-adventures
#[utoipa::path(
    get,
    path = "/v1/admin/gm-adventures",
    responses((status = 200, description = "All adventure rows", body = [GmAdventure])),
    tag = "admin"
)]
async fn list_gm_adventures(State(state): State<AppState>) -> Result<Json<Vec<GmAdventure>>, AppError> {
    Ok(Json(state.store.list_gm_adventures().await?))
}

/// POST /v1/admin/gm-adventures
#[utoipa::path(
    post,
    path = "/v1/admin/gm-adventures",
    request_body = CreateGmAdventureRequest,
    responses(
        (status = 201, description = "Adventure recorded", body = GmAdventure),
        (status = 409, description = "Already recorded", body = crate::error::ErrorBody),
        (status = 422, description = "Pair not assigned or id is not an adventure option", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn create_gm_adventure(
    State(state): State<AppState>,
    body: Result<Json<CreateGmAdventureRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GmAdventure>), AppError> {
    let req = extract_json(body)?;
    let row = state
        .store
        .create_gm_adventure(
            req.gm_option_id,
            req.convention_option_id,
            req.adventure_option_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// DELETE /v1/admin/gm-adventures/:id
#[utoipa::path(
    delete,
    path = "/v1/admin/gm-adventures/{id}",
    params(("id" = i64, Path, description = "Adventure row ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_gm_adventure(
    State(state): State<AppState>,
    Path(id): Path<AssignmentId>,
) -> Result<StatusCode, AppError> {
    state.store.delete_gm_adventure(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
