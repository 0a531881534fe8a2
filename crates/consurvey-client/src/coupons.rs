//! Coupon endpoints used at the end of the questionnaire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use consurvey_core::{CouponCode, CouponDelivery, CouponOutcome, MarkAction, ResponseId};

use crate::error::ClientError;
use crate::transport::Transport;

/// Error code the API returns when the pool has no eligible code.
pub const NO_COUPONS_AVAILABLE: &str = "NO_COUPONS_AVAILABLE";

#[derive(Debug, Serialize)]
struct AssignCouponRequest {
    response_id: ResponseId,
}

/// A code bound to a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedCoupon {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct MarkUsedRequest<'a> {
    code: &'a str,
    action: MarkAction,
}

#[derive(Debug, Serialize)]
struct EmailCouponRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_id: Option<ResponseId>,
    coupon_code: &'a str,
    email: &'a str,
}

/// Result of emailing a code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCouponResponse {
    pub coupon: CouponCode,
    pub delivery: Option<CouponDelivery>,
}

#[derive(Debug, Serialize)]
struct RecordDeliveryRequest<'a> {
    response_id: ResponseId,
    coupon_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_address: Option<&'a str>,
    email_sent: bool,
}

/// Client for `/v1/coupons`.
#[derive(Debug, Clone)]
pub struct CouponsClient {
    transport: Transport,
}

impl CouponsClient {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Allocate a code for a response.
    ///
    /// An exhausted pool is not an error: it yields
    /// [`CouponOutcome::Unavailable`]. Repeating the call for the same
    /// response returns the code it already holds.
    pub async fn assign(&self, response_id: ResponseId) -> Result<CouponOutcome, ClientError> {
        let endpoint = "POST /v1/coupons/assign";
        let url = self.transport.url("/v1/coupons/assign");
        let body = AssignCouponRequest { response_id };
        let result: Result<AssignedCoupon, ClientError> = self
            .transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await;

        match result {
            Ok(assigned) => Ok(CouponOutcome::Assigned {
                code: assigned.code,
            }),
            Err(e)
                if e.status() == Some(404)
                    && e.api_code().as_deref() == Some(NO_COUPONS_AVAILABLE) =>
            {
                tracing::info!(response_id = %response_id, "coupon pool exhausted");
                Ok(CouponOutcome::Unavailable)
            }
            Err(e) => Err(e),
        }
    }

    /// Record that the respondent copied or emailed their code.
    pub async fn mark_used(&self, code: &str, action: MarkAction) -> Result<CouponCode, ClientError> {
        let endpoint = "POST /v1/coupons/mark-used";
        let url = self.transport.url("/v1/coupons/mark-used");
        let body = MarkUsedRequest { code, action };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }

    /// Email a code to the respondent.
    pub async fn email(
        &self,
        response_id: Option<ResponseId>,
        code: &str,
        email: &str,
    ) -> Result<EmailCouponResponse, ClientError> {
        let endpoint = "POST /v1/coupons/email";
        let url = self.transport.url("/v1/coupons/email");
        let body = EmailCouponRequest {
            response_id,
            coupon_code: code,
            email,
        };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }

    /// Upsert the delivery record for a response's code.
    pub async fn record_delivery(
        &self,
        response_id: ResponseId,
        code: &str,
        email_address: Option<&str>,
        email_sent: bool,
    ) -> Result<CouponDelivery, ClientError> {
        let endpoint = "POST /v1/coupons/deliveries";
        let url = self.transport.url("/v1/coupons/deliveries");
        let body = RecordDeliveryRequest {
            response_id,
            coupon_code: code,
            email_address,
            email_sent,
        };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }
}
