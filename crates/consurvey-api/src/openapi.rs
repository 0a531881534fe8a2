//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented route into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// OpenAPI document for the whole survey service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Convention Survey API",
        version = "0.3.0",
        description = "Post-game survey service for convention play.\n\nProvides:\n- **Survey definitions** with GM and adventure dropdowns narrowed by convention assignments\n- **Two-phase response submission** plus GM volunteer contact records\n- **Coupon codes** allocated once per response from a shared pool\n- **Staff administration** of options, GM assignments, responses, coupons and CSV exports\n- **Rating analytics** per convention\n\nThere is no authentication. Deploy `/v1/admin/*` behind a gateway.",
        license(name = "AGPL-3.0-or-later")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // -- Survey ---------------------------------------------------------
        crate::routes::survey::get_survey,
        crate::routes::survey::list_gms,
        crate::routes::survey::list_adventures,
        crate::routes::survey::submit_response,
        crate::routes::survey::attach_answers,
        crate::routes::survey::submit_gm_interest,
        // -- Coupons --------------------------------------------------------
        crate::routes::coupons::assign_coupon,
        crate::routes::coupons::mark_used,
        crate::routes::coupons::record_delivery,
        crate::routes::coupons::email_coupon,
        crate::routes::coupons::list_coupons,
        crate::routes::coupons::import_coupons,
        crate::routes::coupons::delete_coupon,
        // -- Options --------------------------------------------------------
        crate::routes::options::list_questions,
        crate::routes::options::create_option,
        crate::routes::options::update_option,
        crate::routes::options::delete_option,
        // -- GM assignments -------------------------------------------------
        crate::routes::associations::list_gm_conventions,
        crate::routes::associations::create_gm_convention,
        crate::routes::associations::delete_gm_convention,
        crate::routes::associations::list_gm_adventures,
        crate::routes::associations::create_gm_adventure,
        crate::routes::associations::delete_gm_adventure,
        // -- Responses and export -------------------------------------------
        crate::routes::responses::list_responses,
        crate::routes::responses::clear_responses,
        crate::routes::responses::export_responses,
        crate::routes::responses::export_gm_interest,
        crate::routes::responses::list_gm_interest,
        crate::routes::responses::reprocess_gm_interest,
        crate::routes::responses::remove_contact_answers,
        // -- Analytics ------------------------------------------------------
        crate::routes::analytics::ratings,
        crate::routes::analytics::conventions,
        crate::routes::analytics::adventures,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::store::ClearedResponses,
            crate::store::ReprocessReport,
            // -- Domain ---------------------------------------------------
            consurvey_core::Survey,
            consurvey_core::Question,
            consurvey_core::QuestionOption,
            consurvey_core::QuestionType,
            consurvey_core::QuestionRole,
            consurvey_core::OptionAvailability,
            consurvey_core::ConventionMatch,
            consurvey_core::NarrowedOptions,
            consurvey_core::AnswerInput,
            consurvey_core::Answer,
            consurvey_core::RespondentInfo,
            consurvey_core::SurveyResponse,
            consurvey_core::ResponseWithAnswers,
            consurvey_core::GmConvention,
            consurvey_core::GmAdventure,
            consurvey_core::GmInterest,
            consurvey_core::GmInterestRow,
            consurvey_core::CouponCode,
            consurvey_core::CouponStatus,
            consurvey_core::CouponDelivery,
            consurvey_core::MarkAction,
            consurvey_core::coupon::ImportError,
            consurvey_core::RatingDistribution,
            consurvey_core::RatingSummary,
            consurvey_core::analytics::RatingBucket,
            consurvey_core::analytics::ConventionSummary,
            // -- Request and response DTOs --------------------------------
            crate::routes::survey::SurveyView,
            crate::routes::survey::SubmitResponseRequest,
            crate::routes::survey::SubmitResponseResponse,
            crate::routes::survey::AttachAnswersRequest,
            crate::routes::survey::AttachAnswersResponse,
            crate::routes::survey::GmInterestRequest,
            crate::routes::coupons::AssignCouponRequest,
            crate::routes::coupons::AssignedCoupon,
            crate::routes::coupons::MarkUsedRequest,
            crate::routes::coupons::RecordDeliveryRequest,
            crate::routes::coupons::EmailCouponRequest,
            crate::routes::coupons::EmailCouponResponse,
            crate::routes::coupons::ImportCouponsRequest,
            crate::routes::coupons::ImportCouponsResponse,
            crate::routes::options::CreateOptionRequest,
            crate::routes::options::UpdateOptionRequest,
            crate::routes::associations::CreateGmConventionRequest,
            crate::routes::associations::CreateGmAdventureRequest,
            crate::routes::responses::RemovedAnswers,
        ),
    ),
    tags(
        (name = "surveys", description = "Survey definitions, narrowing, responses and GM volunteer contact"),
        (name = "coupons", description = "Coupon allocation, use marking and delivery"),
        (name = "admin", description = "Staff administration of options, GM assignments, responses and coupon inventory"),
        (name = "analytics", description = "Rating distributions and the convention and adventure lists behind them"),
    )
)]
pub struct ApiDoc;

/// Serves the document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_generates_with_service_info() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Convention Survey API");
        assert_eq!(doc.info.version, "0.3.0");
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.paths.paths.len(), 28);
        for path in [
            "/v1/surveys/{id}",
            "/v1/surveys/{id}/responses/{response_id}/answers",
            "/v1/coupons/assign",
            "/v1/admin/coupons/{id}",
            "/v1/admin/gm-adventures",
            "/v1/admin/export/responses.csv",
            "/v1/admin/ratings",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn openapi_has_tags() {
        let doc = ApiDoc::openapi();
        let tags = doc.tags.expect("tags are declared");
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["surveys", "coupons", "admin", "analytics"]);
    }

    #[test]
    fn openapi_has_server() {
        let doc = ApiDoc::openapi();
        let servers = doc.servers.expect("servers are declared");
        assert_eq!(servers[0].url, "http://localhost:8080");
    }

    #[test]
    fn openapi_registers_error_schema() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components are declared");
        assert!(components.schemas.contains_key("ErrorBody"));
        assert!(components.schemas.contains_key("RatingSummary"));
    }

    #[test]
    fn openapi_serializes_to_json() {
        let json = serde_json::to_string(&ApiDoc::openapi()).expect("serializes");
        assert!(json.contains("\"/v1/admin/gm-conventions\""));
    }

    #[test]
    fn router_builds() {
        let _router: Router<AppState> = router();
    }
}
