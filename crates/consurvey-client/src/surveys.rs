//! Respondent-facing survey endpoints.
//!
//! Fetching a (narrowed) definition, submitting phase-one answers and
//! attaching the GM volunteer step.

use serde::{Deserialize, Serialize};

use consurvey_core::{
    AnswerInput, ConventionMatch, GmContact, GmInterest, NarrowedOptions, OptionId, Question,
    RespondentInfo, ResponseId, Selection, Survey, SurveyDefinition, SurveyId,
};

use crate::error::ClientError;
use crate::transport::Transport;

/// A survey definition as served, narrowed to the requested selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyView {
    pub survey: Survey,
    pub questions: Vec<Question>,
    pub preselected_convention: Option<ConventionMatch>,
}

impl SurveyView {
    pub fn into_definition(self) -> SurveyDefinition {
        SurveyDefinition::new(self.survey, self.questions)
    }
}

/// Query parameters for the definition and narrowing endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convention_option_id: Option<OptionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gm_option_id: Option<OptionId>,
}

impl From<Selection> for SelectionParams {
    fn from(selection: Selection) -> Self {
        Self {
            convention: None,
            convention_option_id: selection.convention,
            gm_option_id: selection.gm,
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitResponseRequest<'a> {
    answers: &'a [AnswerInput],
    #[serde(skip_serializing_if = "Option::is_none")]
    respondent: Option<&'a RespondentInfo>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponseResponse {
    response_id: ResponseId,
}

#[derive(Debug, Serialize)]
struct AttachAnswersRequest<'a> {
    answers: &'a [AnswerInput],
}

#[derive(Debug, Deserialize)]
struct AttachAnswersResponse {
    inserted: u64,
}

#[derive(Debug, Serialize)]
struct GmInterestRequest<'a> {
    response_id: ResponseId,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
}

/// Client for `/v1/surveys` and `/v1/gm-interest`.
#[derive(Debug, Clone)]
pub struct SurveysClient {
    transport: Transport,
}

impl SurveysClient {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Fetch a survey narrowed to `params`.
    ///
    /// Calls `GET /v1/surveys/{id}`.
    pub async fn definition(
        &self,
        survey_id: SurveyId,
        params: &SelectionParams,
    ) -> Result<SurveyView, ClientError> {
        let endpoint = "GET /v1/surveys/:id";
        let url = self.transport.url(&format!("/v1/surveys/{survey_id}"));
        self.transport
            .json(endpoint, || self.transport.http().get(&url).query(params))
            .await
    }

    /// GM options available at the selected convention.
    pub async fn gms(
        &self,
        survey_id: SurveyId,
        params: &SelectionParams,
    ) -> Result<NarrowedOptions, ClientError> {
        let endpoint = "GET /v1/surveys/:id/gms";
        let url = self.transport.url(&format!("/v1/surveys/{survey_id}/gms"));
        self.transport
            .json(endpoint, || self.transport.http().get(&url).query(params))
            .await
    }

    /// Adventures the selected GM runs at the selected convention.
    pub async fn adventures(
        &self,
        survey_id: SurveyId,
        params: &SelectionParams,
    ) -> Result<NarrowedOptions, ClientError> {
        let endpoint = "GET /v1/surveys/:id/adventures";
        let url = self
            .transport
            .url(&format!("/v1/surveys/{survey_id}/adventures"));
        self.transport
            .json(endpoint, || self.transport.http().get(&url).query(params))
            .await
    }

    /// Phase-one submission. Returns the new response id.
    pub async fn submit_response(
        &self,
        survey_id: SurveyId,
        answers: &[AnswerInput],
        respondent: Option<&RespondentInfo>,
    ) -> Result<ResponseId, ClientError> {
        let endpoint = "POST /v1/surveys/:id/responses";
        let url = self
            .transport
            .url(&format!("/v1/surveys/{survey_id}/responses"));
        let body = SubmitResponseRequest {
            answers,
            respondent,
        };
        let created: SubmitResponseResponse = self
            .transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await?;
        Ok(created.response_id)
    }

    /// Attach further answers to an existing response. Returns rows written.
    pub async fn attach_answers(
        &self,
        survey_id: SurveyId,
        response_id: ResponseId,
        answers: &[AnswerInput],
    ) -> Result<u64, ClientError> {
        let endpoint = "POST /v1/surveys/:id/responses/:response_id/answers";
        let url = self.transport.url(&format!(
            "/v1/surveys/{survey_id}/responses/{response_id}/answers"
        ));
        let body = AttachAnswersRequest { answers };
        let attached: AttachAnswersResponse = self
            .transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await?;
        Ok(attached.inserted)
    }

    /// Store or update the GM volunteer contact for a response.
    pub async fn submit_gm_interest(
        &self,
        response_id: ResponseId,
        contact: &GmContact,
    ) -> Result<GmInterest, ClientError> {
        let endpoint = "POST /v1/gm-interest";
        let url = self.transport.url("/v1/gm-interest");
        let body = GmInterestRequest {
            response_id,
            first_name: &contact.first_name,
            last_name: &contact.last_name,
            email: &contact.email,
        };
        self.transport
            .json(endpoint, || self.transport.http().post(&url).json(&body))
            .await
    }
}
