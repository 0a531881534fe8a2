//! # consurvey-client
//!
//! Typed HTTP client for the convention survey API.
//!
//! ## Sub-clients
//!
//! - [`SurveysClient`]: survey definitions, narrowing, response submission
//!   and the GM volunteer step.
//! - [`CouponsClient`]: allocation, usage marking, email and delivery
//!   records.
//! - [`AdminClient`]: coupon inventory, analytics, exports, options and
//!   GM assignments.
//!
//! Wire types come from `consurvey-core`. Transport failures are retried
//! with backoff; API errors are surfaced as [`ClientError::ApiError`] with
//! the response body so callers can read the error code.

pub mod admin;
pub mod config;
pub mod coupons;
pub mod error;
pub mod surveys;
pub(crate) mod transport;

pub use admin::AdminClient;
pub use config::{ClientConfig, RetryPolicy};
pub use coupons::CouponsClient;
pub use error::ClientError;
pub use surveys::{SelectionParams, SurveyView, SurveysClient};

/// Top-level client holding one sub-client per API area.
#[derive(Debug, Clone)]
pub struct SurveyClient {
    surveys: SurveysClient,
    coupons: CouponsClient,
    admin: AdminClient,
    transport: transport::Transport,
}

impl SurveyClient {
    /// Create a new client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let transport = transport::Transport::new(http, config.base_url, config.retry);
        Ok(Self {
            surveys: SurveysClient::new(transport.clone()),
            coupons: CouponsClient::new(transport.clone()),
            admin: AdminClient::new(transport.clone()),
            transport,
        })
    }

    /// Access the survey sub-client.
    pub fn surveys(&self) -> &SurveysClient {
        &self.surveys
    }

    /// Access the coupon sub-client.
    pub fn coupons(&self) -> &CouponsClient {
        &self.coupons
    }

    /// Access the admin sub-client.
    pub fn admin(&self) -> &AdminClient {
        &self.admin
    }

    /// Whether the server reports itself ready (database reachable).
    pub async fn ready(&self) -> Result<bool, ClientError> {
        let endpoint = "GET /health/readiness";
        let url = self.transport.url("/health/readiness");
        match self
            .transport
            .send(endpoint, || self.transport.http().get(&url))
            .await
        {
            Ok(_) => Ok(true),
            Err(ClientError::ApiError { status: 503, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
