//! Staff endpoints under `/v1/admin`.

use serde::{Deserialize, Serialize};

use consurvey_core::analytics::ConventionSummary;
use consurvey_core::coupon::ImportError;
use consurvey_core::{
    AssignmentId, CouponCode, CouponId, CouponStatus, GmAdventure, GmConvention, GmInterestRow,
    OptionId, Question, QuestionId, QuestionOption, RatingSummary, ResponseWithAnswers,
};

use crate::error::ClientError;
use crate::transport::Transport;

/// Outcome of a bulk coupon import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub error_count: usize,
    pub results: Vec<CouponCode>,
    pub errors: Vec<ImportError>,
}

/// Rows removed by clearing all responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClearedResponses {
    pub answers: u64,
    pub responses: u64,
}

/// Result of rebuilding GM interest records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReprocessReport {
    pub processed: u64,
    pub skipped: u64,
}

#[derive(Debug, Deserialize)]
struct RemovedAnswers {
    deleted: u64,
}

#[derive(Debug, Serialize)]
struct ImportCouponsRequest<'a> {
    codes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct StatusQuery {
    status: CouponStatus,
}

#[derive(Debug, Serialize)]
struct ConventionQuery<'a> {
    convention: &'a str,
}

#[derive(Debug, Serialize)]
struct LimitQuery {
    limit: u32,
}

#[derive(Debug, Serialize)]
struct CreateOptionRequest<'a> {
    question_id: QuestionId,
    option_text: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateOptionRequest<'a> {
    option_text: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateGmConventionRequest {
    gm_option_id: OptionId,
    convention_option_id: OptionId,
}

#[derive(Debug, Serialize)]
struct CreateGmAdventureRequest {
    gm_option_id: OptionId,
    convention_option_id: OptionId,
    adventure_option_id: OptionId,
}

/// Client for the staff API. Every call works on the server's default
/// survey.
#[derive(Debug, Clone)]
pub struct AdminClient {
    transport: Transport,
}

impl AdminClient {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    // -- coupons ---------------------------------------------------------

    /// List codes, optionally filtered by effective status.
    pub async fn list_coupons(
        &self,
        status: Option<CouponStatus>,
    ) -> Result<Vec<CouponCode>, ClientError> {
        let endpoint = "GET /v1/admin/coupons";
        let url = self.transport.url("/v1/admin/coupons");
        self.transport
            .json(endpoint, || {
                let req = self.transport.http().get(&url);
                match status {
                    Some(status) => req.query(&StatusQuery { status }),
                    None => req,
                }
            })
            .await
    }

    /// Import codes in bulk. Duplicates and blanks are reported per line.
    pub async fn import_coupons(
        &self,
        codes: &[String],
        notes: Option<&str>,
    ) -> Result<ImportSummary, ClientError> {
        let endpoint = "POST /v1/admin/coupons";
        let url = self.transport.url("/v1/admin/coupons");
        let body = ImportCouponsRequest { codes, notes };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }

    pub async fn delete_coupon(&self, id: CouponId) -> Result<(), ClientError> {
        let endpoint = "DELETE /v1/admin/coupons/:id";
        let url = self.transport.url(&format!("/v1/admin/coupons/{id}"));
        self.transport
            .send(endpoint, || self.transport.http().delete(&url))
            .await?;
        Ok(())
    }

    // -- analytics -------------------------------------------------------

    /// Rating distributions, optionally filtered to one convention.
    pub async fn ratings(&self, convention: Option<&str>) -> Result<RatingSummary, ClientError> {
        let endpoint = "GET /v1/admin/ratings";
        let url = self.transport.url("/v1/admin/ratings");
        self.transport
            .json(endpoint, || {
                let req = self.transport.http().get(&url);
                match convention {
                    Some(convention) => req.query(&ConventionQuery { convention }),
                    None => req,
                }
            })
            .await
    }

    pub async fn conventions(&self) -> Result<Vec<ConventionSummary>, ClientError> {
        let endpoint = "GET /v1/admin/conventions";
        let url = self.transport.url("/v1/admin/conventions");
        self.transport
            .json(endpoint, || self.transport.http().get(&url))
            .await
    }

    pub async fn adventures(&self) -> Result<Vec<String>, ClientError> {
        let endpoint = "GET /v1/admin/adventures";
        let url = self.transport.url("/v1/admin/adventures");
        self.transport
            .json(endpoint, || self.transport.http().get(&url))
            .await
    }

    // -- responses and GM interest ---------------------------------------

    pub async fn list_responses(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<ResponseWithAnswers>, ClientError> {
        let endpoint = "GET /v1/admin/responses";
        let url = self.transport.url("/v1/admin/responses");
        self.transport
            .json(endpoint, || {
                let req = self.transport.http().get(&url);
                match limit {
                    Some(limit) => req.query(&LimitQuery { limit }),
                    None => req,
                }
            })
            .await
    }

    /// Delete every response and answer. Assigned coupons are unlinked.
    pub async fn clear_responses(&self) -> Result<ClearedResponses, ClientError> {
        let endpoint = "DELETE /v1/admin/responses";
        let url = self.transport.url("/v1/admin/responses");
        self.transport
            .json(endpoint, || self.transport.http().delete(&url))
            .await
    }

    /// The responses export as CSV text.
    pub async fn export_responses_csv(&self) -> Result<String, ClientError> {
        let endpoint = "GET /v1/admin/export/responses.csv";
        let url = self.transport.url("/v1/admin/export/responses.csv");
        self.transport
            .text(endpoint, || self.transport.http().get(&url))
            .await
    }

    /// The GM interest export as CSV text.
    pub async fn export_gm_interest_csv(&self) -> Result<String, ClientError> {
        let endpoint = "GET /v1/admin/export/gm-interest.csv";
        let url = self.transport.url("/v1/admin/export/gm-interest.csv");
        self.transport
            .text(endpoint, || self.transport.http().get(&url))
            .await
    }

    pub async fn gm_interest(&self) -> Result<Vec<GmInterestRow>, ClientError> {
        let endpoint = "GET /v1/admin/gm-interest";
        let url = self.transport.url("/v1/admin/gm-interest");
        self.transport
            .json(endpoint, || self.transport.http().get(&url))
            .await
    }

    /// Rebuild GM interest records from stored contact answers.
    pub async fn reprocess_gm_interest(&self) -> Result<ReprocessReport, ClientError> {
        let endpoint = "POST /v1/admin/gm-interest/reprocess";
        let url = self.transport.url("/v1/admin/gm-interest/reprocess");
        self.transport
            .json(endpoint, || self.transport.http().post(&url))
            .await
    }

    /// Delete the contact answers. Returns the number of rows removed.
    pub async fn remove_contact_answers(&self) -> Result<u64, ClientError> {
        let endpoint = "POST /v1/admin/gm-interest/remove-answers";
        let url = self.transport.url("/v1/admin/gm-interest/remove-answers");
        let removed: RemovedAnswers = self
            .transport
            .json(endpoint, || self.transport.http().post(&url))
            .await?;
        Ok(removed.deleted)
    }

    // -- questions and options -------------------------------------------

    pub async fn questions(&self) -> Result<Vec<Question>, ClientError> {
        let endpoint = "GET /v1/admin/questions";
        let url = self.transport.url("/v1/admin/questions");
        self.transport
            .json(endpoint, || self.transport.http().get(&url))
            .await
    }

    pub async fn create_option(
        &self,
        question_id: QuestionId,
        option_text: &str,
    ) -> Result<QuestionOption, ClientError> {
        let endpoint = "POST /v1/admin/options";
        let url = self.transport.url("/v1/admin/options");
        let body = CreateOptionRequest {
            question_id,
            option_text,
        };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }

    /// Rename an option. Its stored value does not change.
    pub async fn update_option(
        &self,
        id: OptionId,
        option_text: &str,
    ) -> Result<QuestionOption, ClientError> {
        let endpoint = "PUT /v1/admin/options/:id";
        let url = self.transport.url(&format!("/v1/admin/options/{id}"));
        let body = UpdateOptionRequest { option_text };
        self.transport
            .json(endpoint, || self.transport.http().put(&url).json(&body))
            .await
    }

    pub async fn delete_option(&self, id: OptionId) -> Result<(), ClientError> {
        let endpoint = "DELETE /v1/admin/options/:id";
        let url = self.transport.url(&format!("/v1/admin/options/{id}"));
        self.transport
            .send(endpoint, || self.transport.http().delete(&url))
            .await?;
        Ok(())
    }

    // -- assignments -----------------------------------------------------

    pub async fn gm_conventions(&self) -> Result<Vec<GmConvention>, ClientError> {
        let endpoint = "GET /v1/admin/gm-conventions";
        let url = self.transport.url("/v1/admin/gm-conventions");
        self.transport
            .json(endpoint, || self.transport.http().get(&url))
            .await
    }

    pub async fn create_gm_convention(
        &self,
        gm_option_id: OptionId,
        convention_option_id: OptionId,
    ) -> Result<GmConvention, ClientError> {
        let endpoint = "POST /v1/admin/gm-conventions";
        let url = self.transport.url("/v1/admin/gm-conventions");
        let body = CreateGmConventionRequest {
            gm_option_id,
            convention_option_id,
        };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }

    /// Remove a GM from a convention, together with their adventures there.
    pub async fn delete_gm_convention(&self, id: AssignmentId) -> Result<(), ClientError> {
        let endpoint = "DELETE /v1/admin/gm-conventions/:id";
        let url = self.transport.url(&format!("/v1/admin/gm-conventions/{id}"));
        self.transport
            .send(endpoint, || self.transport.http().delete(&url))
            .await?;
        Ok(())
    }

    pub async fn gm_adventures(&self) -> Result<Vec<GmAdventure>, ClientError> {
        let endpoint = "GET /v1/admin/gm-adventures";
        let url = self.transport.url("/v1/admin/gm-adventures");
        self.transport
            .json(endpoint, || self.transport.http().get(&url))
            .await
    }

    /// Requires the GM to already be assigned to the convention.
    pub async fn create_gm_adventure(
        &self,
        gm_option_id: OptionId,
        convention_option_id: OptionId,
        adventure_option_id: OptionId,
    ) -> Result<GmAdventure, ClientError> {
        let endpoint = "POST /v1/admin/gm-adventures";
        let url = self.transport.url("/v1/admin/gm-adventures");
        let body = CreateGmAdventureRequest {
            gm_option_id,
            convention_option_id,
            adventure_option_id,
        };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }

    pub async fn delete_gm_adventure(&self, id: AssignmentId) -> Result<(), ClientError> {
        let endpoint = "DELETE /v1/admin/gm-adventures/:id";
        let url = self.transport.url(&format!("/v1/admin/gm-adventures/{id}"));
        self.transport
            .send(endpoint, || self.transport.http().delete(&url))
            .await?;
        Ok(())
    }
}
