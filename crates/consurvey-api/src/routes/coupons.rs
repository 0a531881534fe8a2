//! # Coupon API
//!
//! Public allocation and redemption tracking, plus the staff inventory.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/v1/coupons/assign` | Allocate a code to a response |
//! | POST | `/v1/coupons/mark-used` | Record a copy or email |
//! | POST | `/v1/coupons/deliveries` | Record a delivery |
//! | POST | `/v1/coupons/email` | Email a code to a respondent |
//! | GET | `/v1/admin/coupons` | List inventory |
//! | POST | `/v1/admin/coupons` | Bulk import |
//! | DELETE | `/v1/admin/coupons/:id` | Delete a code |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use consurvey_core::coupon::{default_expiry, ImportError};
use consurvey_core::question::validate_email;
use consurvey_core::{
    CouponCode, CouponDelivery, CouponId, CouponStatus, MarkAction, ResponseId,
};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, Validate};
use crate::mailer::CouponEmail;
use crate::state::AppState;
use crate::store::NewDelivery;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignCouponRequest {
    pub response_id: ResponseId,
}

/// A code bound to a response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignedCoupon {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkUsedRequest {
    pub code: String,
    pub action: MarkAction,
}

impl Validate for MarkUsedRequest {
    fn validate(&self) -> Result<(), String> {
        not_blank("code", &self.code)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordDeliveryRequest {
    pub response_id: ResponseId,
    pub coupon_code: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub email_sent: bool,
}

impl Validate for RecordDeliveryRequest {
    fn validate(&self) -> Result<(), String> {
        not_blank("coupon_code", &self.coupon_code)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailCouponRequest {
    #[serde(default)]
    pub response_id: Option<ResponseId>,
    pub coupon_code: String,
    pub email: String,
}

impl Validate for EmailCouponRequest {
    fn validate(&self) -> Result<(), String> {
        not_blank("coupon_code", &self.coupon_code)?;
        validate_email(&self.email).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailCouponResponse {
    pub coupon: CouponCode,
    /// Present when a `response_id` was given.
    pub delivery: Option<CouponDelivery>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CouponListQuery {
    /// Only codes with this effective status.
    pub status: Option<CouponStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportCouponsRequest {
    pub codes: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportCouponsResponse {
    pub created: usize,
    pub error_count: usize,
    pub results: Vec<CouponCode>,
    pub errors: Vec<ImportError>,
}

fn not_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn normalized(code: &str) -> Result<String, AppError> {
    Ok(consurvey_core::coupon::normalize_code(code)?)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/coupons/assign", post(assign_coupon))
        .route("/v1/coupons/mark-used", post(mark_used))
        .route("/v1/coupons/deliveries", post(record_delivery))
        .route("/v1/coupons/email", post(email_coupon))
        .route("/v1/admin/coupons", get(list_coupons).post(import_coupons))
        .route("/v1/admin/coupons/:id", delete(delete_coupon))
}

// -- Public -------------------------------------------------------------------

/// POST /v1/coupons/assign
#[utoipa::path(
    post,
    path = "/v1/coupons/assign",
    request_body = AssignCouponRequest,
    responses(
        (status = 200, description = "Code allocated", body = AssignedCoupon),
        (status = 404, description = "Response missing (NOT_FOUND) or pool exhausted (NO_COUPONS_AVAILABLE)", body = crate::error::ErrorBody),
    ),
    tag = "coupons"
)]
async fn assign_coupon(
    State(state): State<AppState>,
    body: Result<Json<AssignCouponRequest>, JsonRejection>,
) -> Result<Json<AssignedCoupon>, AppError> {
    let req = extract_json(body)?;
    let coupon = state
        .store
        .assign_coupon(req.response_id, Utc::now())
        .await?
        .ok_or(AppError::CouponsExhausted)?;

    tracing::info!(response_id = %req.response_id, code = %coupon.code, "coupon assigned");
    Ok(Json(AssignedCoupon {
        code: coupon.code,
        expires_at: coupon.expires_at,
    }))
}

/// POST /v1/coupons/mark-used
#[utoipa::path(
    post,
    path = "/v1/coupons/mark-used",
    request_body = MarkUsedRequest,
    responses(
        (status = 200, description = "Code marked", body = CouponCode),
        (status = 404, description = "Unknown code", body = crate::error::ErrorBody),
        (status = 409, description = "Code expired", body = crate::error::ErrorBody),
    ),
    tag = "coupons"
)]
async fn mark_used(
    State(state): State<AppState>,
    body: Result<Json<MarkUsedRequest>, JsonRejection>,
) -> Result<Json<CouponCode>, AppError> {
    let req = extract_validated_json(body)?;
    let code = normalized(&req.code)?;
    let coupon = state.store.mark_coupon(&code, req.action, Utc::now()).await?;
    tracing::info!(code = %coupon.code, action = req.action.as_str(), "coupon marked used");
    Ok(Json(coupon))
}

/// POST /v1/coupons/deliveries
#[utoipa::path(
    post,
    path = "/v1/coupons/deliveries",
    request_body = RecordDeliveryRequest,
    responses(
        (status = 200, description = "Delivery recorded", body = CouponDelivery),
        (status = 404, description = "Response not found", body = crate::error::ErrorBody),
    ),
    tag = "coupons"
)]
async fn record_delivery(
    State(state): State<AppState>,
    body: Result<Json<RecordDeliveryRequest>, JsonRejection>,
) -> Result<Json<CouponDelivery>, AppError> {
    let req = extract_validated_json(body)?;
    let delivery = state
        .store
        .record_delivery(NewDelivery {
            response_id: req.response_id,
            coupon_code: normalized(&req.coupon_code)?,
            email_address: req
                .email_address
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            email_sent: req.email_sent,
        })
        .await?;
    Ok(Json(delivery))
}

/// POST /v1/coupons/email
#[utoipa::path(
    post,
    path = "/v1/coupons/email",
    request_body = EmailCouponRequest,
    responses(
        (status = 200, description = "Code emailed", body = EmailCouponResponse),
        (status = 404, description = "Unknown code or response", body = crate::error::ErrorBody),
        (status = 409, description = "Code expired", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid email", body = crate::error::ErrorBody),
    ),
    tag = "coupons"
)]
async fn email_coupon(
    State(state): State<AppState>,
    body: Result<Json<EmailCouponRequest>, JsonRejection>,
) -> Result<Json<EmailCouponResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let code = normalized(&req.coupon_code)?;
    let email = req.email.trim().to_string();

    // Refuse unknown and expired codes before anything is sent.
    let mut checked = state.store.coupon(&code).await?;
    checked.mark(MarkAction::Emailed, Utc::now())?;

    state
        .mailer
        .send_coupon(&CouponEmail {
            to: email.clone(),
            coupon_code: checked.code.clone(),
        })
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    let coupon = state
        .store
        .mark_coupon(&code, MarkAction::Emailed, Utc::now())
        .await?;

    let delivery = match req.response_id {
        Some(response_id) => Some(
            state
                .store
                .record_delivery(NewDelivery {
                    response_id,
                    coupon_code: coupon.code.clone(),
                    email_address: Some(email),
                    email_sent: true,
                })
                .await?,
        ),
        None => None,
    };

    Ok(Json(EmailCouponResponse { coupon, delivery }))
}

// -- Admin ----------------------------------------------------------------------

/// GET /v1/admin/coupons
#[utoipa::path(
    get,
    path = "/v1/admin/coupons",
    params(CouponListQuery),
    responses(
        (status = 200, description = "Codes newest first", body = [CouponCode]),
    ),
    tag = "admin"
)]
async fn list_coupons(
    State(state): State<AppState>,
    query: Result<Query<CouponListQuery>, QueryRejection>,
) -> Result<Json<Vec<CouponCode>>, AppError> {
    let query = extract_query(query)?;
    let coupons = state.store.list_coupons(query.status, Utc::now()).await?;
    Ok(Json(coupons))
}

/// POST /v1/admin/coupons
#[utoipa::path(
    post,
    path = "/v1/admin/coupons",
    request_body = ImportCouponsRequest,
    responses(
        (status = 200, description = "Import report", body = ImportCouponsResponse),
    ),
    tag = "admin"
)]
async fn import_coupons(
    State(state): State<AppState>,
    body: Result<Json<ImportCouponsRequest>, JsonRejection>,
) -> Result<Json<ImportCouponsResponse>, AppError> {
    let req = extract_json(body)?;
    let expires_at = default_expiry(Utc::now(), state.config.coupon_validity_days);
    let report = state
        .store
        .import_coupons(&req.codes, req.notes.as_deref(), expires_at)
        .await?;

    tracing::info!(
        created = report.created.len(),
        rejected = report.errors.len(),
        "coupon codes imported"
    );
    Ok(Json(ImportCouponsResponse {
        created: report.created.len(),
        error_count: report.errors.len(),
        results: report.created,
        errors: report.errors,
    }))
}

/// DELETE /v1/admin/coupons/:id
#[utoipa::path(
    delete,
    path = "/v1/admin/coupons/{id}",
    params(("id" = i64, Path, description = "Coupon ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
) -> Result<StatusCode, AppError> {
    state.store.delete_coupon(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
