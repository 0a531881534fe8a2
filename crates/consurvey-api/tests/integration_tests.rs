//! # Integration Tests for consurvey-api
//!
//! Drives the full router over the in-memory store: survey narrowing, the
//! two-phase submission, GM interest, coupon allocation and redemption,
//! staff administration, export, analytics, probes and OpenAPI.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;

use tower::ServiceExt;

use consurvey_api::mailer::{CouponEmail, MailError, Mailer};
use consurvey_api::state::{AppConfig, AppState};
use consurvey_api::store::SurveyStore;
use consurvey_core::survey::default_survey;

/// Helper: build the test app over a fresh in-memory store.
fn test_app() -> axum::Router {
    consurvey_api::app(AppState::new())
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: send a request and decode the JSON body (`Null` when empty).
async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let text = body_string(response).await;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, value)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

/// Helper: add an option and return its id.
async fn add_option(app: &axum::Router, question_id: i64, text: &str) -> i64 {
    let (status, body) = post(
        app,
        "/v1/admin/options",
        json!({"question_id": question_id, "option_text": text}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

/// Helper: submit phase one and return the response id.
async fn submit(app: &axum::Router, answers: Value) -> i64 {
    let (status, body) = post(app, "/v1/surveys/1/responses", json!({"answers": answers})).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["response_id"].as_i64().unwrap()
}

async fn import(app: &axum::Router, codes: &[&str]) -> Value {
    let (status, body) = post(app, "/v1/admin/coupons", json!({"codes": codes})).await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn option_texts(question: &Value) -> Vec<String> {
    question["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["option_text"].as_str().unwrap().to_string())
        .collect()
}

/// Two GMs at Gen Con; only Alex runs an adventure there.
async fn seed_assignments(app: &axum::Router) -> (i64, i64, i64) {
    let alex = add_option(app, 2, "Alex Rivera").await;
    let sam = add_option(app, 2, "Sam Lee").await;
    let vault = add_option(app, 3, "The Sunless Vault").await;
    for gm in [alex, sam] {
        let (status, _) = post(
            app,
            "/v1/admin/gm-conventions",
            json!({"gm_option_id": gm, "convention_option_id": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = post(
        app,
        "/v1/admin/gm-adventures",
        json!({"gm_option_id": alex, "convention_option_id": 1, "adventure_option_id": vault}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (alex, sam, vault)
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe_without_database() {
    let app = test_app();
    let (status, body) = get(&app, "/health/readiness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

// -- Survey Definition and Narrowing ------------------------------------------

#[tokio::test]
async fn test_survey_definition_lists_questions_in_order() {
    let app = test_app();
    let (status, body) = get(&app, "/v1/surveys/1").await;
    assert_eq!(status, StatusCode::OK);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 10);
    assert_eq!(questions[0]["role"], "convention");
    assert_eq!(option_texts(&questions[0]).len(), 4);
    assert!(body["preselected_convention"].is_null());
}

#[tokio::test]
async fn test_unknown_survey_is_404() {
    let app = test_app();
    let (status, body) = get(&app, "/v1/surveys/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_convention_link_narrows_gm_dropdown() {
    let app = test_app();
    seed_assignments(&app).await;
    add_option(&app, 2, "Jordan Kim").await;

    let (status, body) = get(&app, "/v1/surveys/1?convention=Gen-Con").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preselected_convention"]["value"], "gen_con");
    let gm_question = &body["questions"][1];
    assert_eq!(gm_question["availability"], "filtered");
    assert_eq!(option_texts(gm_question), ["Alex Rivera", "Sam Lee"]);

    // No selection keeps the full list.
    let (_, body) = get(&app, "/v1/surveys/1").await;
    assert_eq!(body["questions"][1]["availability"], "unfiltered");
    assert_eq!(option_texts(&body["questions"][1]).len(), 3);
}

#[tokio::test]
async fn test_convention_without_gms_is_unassigned() {
    let app = test_app();
    seed_assignments(&app).await;
    let (status, body) = get(&app, "/v1/surveys/1/gms?convention_option_id=4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"], "unassigned");
    assert!(body["options"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_adventures_follow_gm_at_convention() {
    let app = test_app();
    let (alex, sam, _) = seed_assignments(&app).await;

    let (_, body) = get(
        &app,
        &format!("/v1/surveys/1/adventures?convention_option_id=1&gm_option_id={alex}"),
    )
    .await;
    assert_eq!(body["availability"], "filtered");
    assert_eq!(body["options"][0]["option_text"], "The Sunless Vault");

    let (_, body) = get(
        &app,
        &format!("/v1/surveys/1/adventures?convention_option_id=1&gm_option_id={sam}"),
    )
    .await;
    assert_eq!(body["availability"], "unassigned");
}

// -- Responses ------------------------------------------------------------------

#[tokio::test]
async fn test_two_phase_submission_attaches_remaining_answers() {
    let app = test_app();
    let response_id = submit(
        &app,
        json!([
            {"question_id": 1, "answer_text": "Gen Con", "answer_value": "gen_con"},
            {"question_id": 4, "answer_value": "5"},
        ]),
    )
    .await;

    let uri = format!("/v1/surveys/1/responses/{response_id}/answers");
    let (status, body) = post(
        &app,
        &uri,
        json!({"answers": [
            {"question_id": 4, "answer_value": "1"},
            {"question_id": 7, "answer_value": "yes"},
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The rating was already answered in phase one.
    assert_eq!(body["inserted"], 1);

    let (_, list) = get(&app, "/v1/admin/responses").await;
    let answers = list[0]["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 3);
    assert!(answers
        .iter()
        .any(|a| a["question_id"] == 4 && a["answer_value"] == "5"));
}

#[tokio::test]
async fn test_contact_answers_are_rejected_on_response_endpoints() {
    let app = test_app();
    let (status, body) = post(
        &app,
        "/v1/surveys/1/responses",
        json!({"answers": [{"question_id": 10, "answer_text": "pat@example.com"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let response_id = submit(&app, json!([{"question_id": 4, "answer_value": "3"}])).await;
    let (status, _) = post(
        &app,
        &format!("/v1/surveys/1/responses/{response_id}/answers"),
        json!({"answers": [{"question_id": 8, "answer_text": "Pat"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_empty_submission_is_rejected() {
    let app = test_app();
    let (status, _) = post(&app, "/v1/surveys/1/responses", json!({"answers": []})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = post(&app, "/v1/surveys/1/responses", json!({"nope": true})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_answer_values_are_rejected() {
    let app = test_app();
    let (status, body) = post(
        &app,
        "/v1/surveys/1/responses",
        json!({"answers": [{"question_id": 4, "answer_value": "99"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = post(
        &app,
        "/v1/surveys/1/responses",
        json!({"answers": [{"question_id": 1, "answer_text": "PAX"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let response_id = submit(&app, json!([{"question_id": 4, "answer_value": "2"}])).await;
    let (status, _) = post(
        &app,
        &format!("/v1/surveys/1/responses/{response_id}/answers"),
        json!({"answers": [{"question_id": 6, "answer_value": "11"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, list) = get(&app, "/v1/admin/responses").await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["answers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_attach_to_inactive_survey_is_404() {
    let state = AppState::new();
    let app = consurvey_api::app(state.clone());
    let response_id = submit(&app, json!([{"question_id": 4, "answer_value": "3"}])).await;

    let SurveyStore::Memory(memory) = &state.store else {
        panic!("test state uses the in-memory store");
    };
    let mut retired = default_survey();
    retired.survey.is_active = false;
    memory.seed(retired);

    let (status, _) = post(
        &app,
        &format!("/v1/surveys/1/responses/{response_id}/answers"),
        json!({"answers": [{"question_id": 5, "answer_value": "4"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_attach_to_unknown_response_is_404() {
    let app = test_app();
    let (status, _) = post(
        &app,
        "/v1/surveys/1/responses/42/answers",
        json!({"answers": [{"question_id": 4, "answer_value": "3"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gm_interest_is_recorded_and_listed() {
    let app = test_app();
    let response_id = submit(&app, json!([{"question_id": 7, "answer_value": "yes"}])).await;

    let (status, body) = post(
        &app,
        "/v1/gm-interest",
        json!({
            "response_id": response_id,
            "first_name": "Pat",
            "last_name": "Quinn",
            "email": "pat@example.com",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["first_name"], "Pat");

    let (status, _) = post(
        &app,
        "/v1/gm-interest",
        json!({"response_id": response_id, "first_name": "Pat", "last_name": "Quinn", "email": "nope"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, rows) = get(&app, "/v1/admin/gm-interest").await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["email"], "pat@example.com");
    assert!(rows[0]["submitted_at"].is_string());
}

// -- Coupons ------------------------------------------------------------------

#[tokio::test]
async fn test_coupon_import_reports_duplicates_and_blanks() {
    let app = test_app();
    let body = import(&app, &["play-1", "PLAY-2", "play-1", "  "]).await;
    assert_eq!(body["created"], 2);
    assert_eq!(body["error_count"], 2);
    assert_eq!(body["results"][0]["code"], "PLAY-1");

    let (_, list) = get(&app, "/v1/admin/coupons?status=available").await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_assign_is_idempotent_and_pool_exhausts() {
    let app = test_app();
    import(&app, &["ONLY-ONE"]).await;
    let first = submit(&app, json!([{"question_id": 4, "answer_value": "4"}])).await;
    let second = submit(&app, json!([{"question_id": 4, "answer_value": "2"}])).await;

    let (status, a) = post(&app, "/v1/coupons/assign", json!({"response_id": first})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(a["code"], "ONLY-ONE");
    let (_, again) = post(&app, "/v1/coupons/assign", json!({"response_id": first})).await;
    assert_eq!(again["code"], "ONLY-ONE");

    let (status, body) = post(&app, "/v1/coupons/assign", json!({"response_id": second})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NO_COUPONS_AVAILABLE");
}

#[tokio::test]
async fn test_assign_for_unknown_response_is_not_found() {
    let app = test_app();
    import(&app, &["X-1"]).await;
    let (status, body) = post(&app, "/v1/coupons/assign", json!({"response_id": 777})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_mark_used_and_email_record_timestamps() {
    let app = test_app();
    import(&app, &["GIFT-9"]).await;
    let response_id = submit(&app, json!([{"question_id": 4, "answer_value": "5"}])).await;
    post(&app, "/v1/coupons/assign", json!({"response_id": response_id})).await;

    let (status, body) = post(
        &app,
        "/v1/coupons/mark-used",
        json!({"code": "gift-9", "action": "copied"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "used");
    assert!(body["copied_at"].is_string());
    assert!(body["emailed_at"].is_null());

    let (status, body) = post(
        &app,
        "/v1/coupons/email",
        json!({"response_id": response_id, "coupon_code": "GIFT-9", "email": "pat@example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["coupon"]["emailed_at"].is_string());
    assert_eq!(body["delivery"]["email_sent"], true);
    assert_eq!(body["delivery"]["email_address"], "pat@example.com");

    let (status, _) = post(
        &app,
        "/v1/coupons/mark-used",
        json!({"code": "MISSING", "action": "copied"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_email_rejects_bad_address() {
    let app = test_app();
    import(&app, &["GIFT-1"]).await;
    let (status, _) = post(
        &app,
        "/v1/coupons/email",
        json!({"coupon_code": "GIFT-1", "email": "not-an-address"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[derive(Debug)]
struct DownMailer;

impl Mailer for DownMailer {
    fn send_coupon(&self, _email: &CouponEmail) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".into()))
    }
}

#[tokio::test]
async fn test_failed_email_leaves_code_unused() {
    let app = consurvey_api::app(AppState::new().with_mailer(Arc::new(DownMailer)));
    import(&app, &["GIFT-2"]).await;
    let (status, body) = post(
        &app,
        "/v1/coupons/email",
        json!({"coupon_code": "GIFT-2", "email": "pat@example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");

    let (_, coupons) = get(&app, "/v1/admin/coupons").await;
    assert!(coupons[0]["emailed_at"].is_null());
    assert_eq!(coupons[0]["status"], "available");
}

#[tokio::test]
async fn test_delete_coupon() {
    let app = test_app();
    let body = import(&app, &["DROP-ME"]).await;
    let id = body["results"][0]["id"].as_i64().unwrap();
    let (status, _) = send(&app, "DELETE", &format!("/v1/admin/coupons/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("/v1/admin/coupons/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_assignment_hands_out_each_code_once() {
    let app = test_app();
    let codes: Vec<String> = (0..10).map(|i| format!("RACE-{i}")).collect();
    let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
    import(&app, &refs).await;

    let mut responses = Vec::new();
    for i in 0..16 {
        let answers = json!([{"question_id": 4, "answer_value": format!("{}", i % 5 + 1)}]);
        responses.push(submit(&app, answers).await);
    }

    let handles: Vec<_> = responses
        .into_iter()
        .map(|response_id| {
            let app = app.clone();
            tokio::spawn(async move {
                post(&app, "/v1/coupons/assign", json!({"response_id": response_id})).await
            })
        })
        .collect();

    let mut assigned = Vec::new();
    let mut exhausted = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        match status {
            StatusCode::OK => assigned.push(body["code"].as_str().unwrap().to_string()),
            StatusCode::NOT_FOUND => exhausted += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(assigned.len(), 10);
    assert_eq!(exhausted, 6);
    assigned.sort();
    assigned.dedup();
    assert_eq!(assigned.len(), 10);
}

// -- Administration -----------------------------------------------------------

#[tokio::test]
async fn test_option_crud() {
    let app = test_app();
    let id = add_option(&app, 1, "Big Bad Con").await;

    let (status, _) = post(
        &app,
        "/v1/admin/options",
        json!({"question_id": 1, "option_text": "big bad con"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post(
        &app,
        "/v1/admin/options",
        json!({"question_id": 4, "option_text": "Five"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/v1/admin/options/{id}"),
        Some(json!({"option_text": "BigBadCon"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["option_text"], "BigBadCon");
    assert_eq!(body["option_value"], "big_bad_con");

    let (status, _) = send(&app, "DELETE", &format!("/v1/admin/options/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, questions) = get(&app, "/v1/admin/questions").await;
    assert_eq!(option_texts(&questions[0]).len(), 4);
}

#[tokio::test]
async fn test_assignment_rules() {
    let app = test_app();
    let (alex, sam, vault) = seed_assignments(&app).await;

    let (status, _) = post(
        &app,
        "/v1/admin/gm-conventions",
        json!({"gm_option_id": alex, "convention_option_id": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A convention id in the GM slot.
    let (status, _) = post(
        &app,
        "/v1/admin/gm-conventions",
        json!({"gm_option_id": 2, "convention_option_id": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Sam is not assigned to Origins.
    let (status, _) = post(
        &app,
        "/v1/admin/gm-adventures",
        json!({"gm_option_id": sam, "convention_option_id": 2, "adventure_option_id": vault}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, pairs) = get(&app, "/v1/admin/gm-conventions").await;
    let alex_pair = pairs
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["gm_option_id"] == alex)
        .unwrap()["id"]
        .as_i64()
        .unwrap();
    let (status, _) = send(&app, "DELETE", &format!("/v1/admin/gm-conventions/{alex_pair}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, adventures) = get(&app, "/v1/admin/gm-adventures").await;
    assert!(adventures.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_csv_exports() {
    let app = test_app();
    let response_id = submit(&app, json!([{"question_id": 1, "answer_text": "Gen Con"}])).await;
    post(
        &app,
        "/v1/gm-interest",
        json!({"response_id": response_id, "first_name": "Pat", "last_name": "Quinn", "email": "pat@example.com"}),
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/admin/export/responses.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/csv; charset=utf-8"
    );
    let csv = body_string(response).await;
    let mut lines = csv.lines();
    assert!(lines
        .next()
        .unwrap()
        .starts_with(r#""Response ID","Submitted At","Email","Name","Which convention are you attending?""#));
    assert!(lines.next().unwrap().contains("Gen Con"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/admin/export/gm-interest.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let csv = body_string(response).await;
    assert!(csv.starts_with("\"Response ID\",\"First Name\",\"Last Name\",\"Email\",\"Submitted At\"\n"));
    assert!(csv.contains("Quinn"));
}

#[tokio::test]
async fn test_clear_responses_unlinks_coupons() {
    let app = test_app();
    import(&app, &["KEEP-1"]).await;
    let response_id = submit(&app, json!([{"question_id": 4, "answer_value": "5"}])).await;
    post(&app, "/v1/coupons/assign", json!({"response_id": response_id})).await;

    let (status, body) = send(&app, "DELETE", "/v1/admin/responses", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responses"], 1);
    assert_eq!(body["answers"], 1);

    let (_, list) = get(&app, "/v1/admin/responses").await;
    assert!(list.as_array().unwrap().is_empty());
    let (_, coupons) = get(&app, "/v1/admin/coupons").await;
    assert_eq!(coupons[0]["code"], "KEEP-1");
    assert!(coupons[0]["response_id"].is_null());
}

#[tokio::test]
async fn test_remove_contact_answers_reports_count() {
    let app = test_app();
    let (status, body) = post(&app, "/v1/admin/gm-interest/remove-answers", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 0);

    let (status, body) = post(&app, "/v1/admin/gm-interest/reprocess", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 0);
}

// -- Analytics ----------------------------------------------------------------

#[tokio::test]
async fn test_ratings_filter_by_convention() {
    let app = test_app();
    submit(
        &app,
        json!([
            {"question_id": 1, "answer_text": "Gen Con", "answer_value": "gen_con"},
            {"question_id": 4, "answer_value": "5"},
            {"question_id": 6, "answer_value": "10"},
        ]),
    )
    .await;
    submit(
        &app,
        json!([
            {"question_id": 1, "answer_text": "Dragon Con", "answer_value": "dragon_con"},
            {"question_id": 4, "answer_value": "3"},
        ]),
    )
    .await;

    let (status, all) = get(&app, "/v1/admin/ratings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["gm_rating"]["total"], 2);
    assert_eq!(all["gm_rating"]["average"], 4.0);
    assert_eq!(all["gm_rating"]["buckets"].as_array().unwrap().len(), 5);
    assert_eq!(all["recommendation_rating"]["buckets"].as_array().unwrap().len(), 10);

    let (_, gen_con) = get(&app, "/v1/admin/ratings?convention=gen_con").await;
    assert_eq!(gen_con["convention"], "gen_con");
    assert_eq!(gen_con["gm_rating"]["total"], 1);
    assert_eq!(gen_con["recommendation_rating"]["buckets"][9]["count"], 1);

    let (_, everything) = get(&app, "/v1/admin/ratings?convention=all").await;
    assert!(everything["convention"].is_null());
    assert_eq!(everything["gm_rating"]["total"], 2);
}

#[tokio::test]
async fn test_convention_and_adventure_lists() {
    let app = test_app();
    // Answered while the option existed; it is retired afterwards.
    let big_bad = add_option(&app, 1, "Big Bad Con").await;
    submit(
        &app,
        json!([
            {"question_id": 1, "answer_text": "Big Bad Con", "answer_value": "big_bad_con"},
            {"question_id": 3, "answer_text": "Homebrew Night"},
        ]),
    )
    .await;
    let (status, _) = send(&app, "DELETE", &format!("/v1/admin/options/{big_bad}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    add_option(&app, 3, "The Sunless Vault").await;
    submit(
        &app,
        json!([
            {"question_id": 1, "answer_text": "Gen Con", "answer_value": "gen_con"},
            {"question_id": 3, "answer_value": "the_sunless_vault"},
        ]),
    )
    .await;

    let (_, conventions) = get(&app, "/v1/admin/conventions").await;
    let conventions = conventions.as_array().unwrap();
    assert_eq!(conventions.len(), 2);
    assert_eq!(conventions[0]["display"], "Big Bad Con");
    assert_eq!(conventions[0]["matched_option"], false);
    assert_eq!(conventions[1]["display"], "Gen Con");
    assert_eq!(conventions[1]["value"], "gen_con");
    assert_eq!(conventions[1]["matched_option"], true);

    let (_, adventures) = get(&app, "/v1/admin/adventures").await;
    assert_eq!(adventures, json!(["Homebrew Night", "The Sunless Vault"]));
}

// -- Metrics, Rate Limit, OpenAPI ---------------------------------------------

#[tokio::test]
async fn test_metrics_report_survey_gauges() {
    let app = test_app();
    import(&app, &["M-1", "M-2"]).await;
    submit(&app, json!([{"question_id": 4, "answer_value": "5"}])).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_string(response).await;
    assert!(text.contains("consurvey_responses_total 1"));
    assert!(text.contains("consurvey_coupons_total{status=\"available\"} 2"));
    assert!(text.contains("consurvey_http_requests_total"));
}

#[tokio::test]
async fn test_metrics_can_be_disabled() {
    let config = AppConfig {
        metrics_enabled: false,
        ..AppConfig::default()
    };
    let app = consurvey_api::app(AppState::with_config(config, None));
    let (status, _) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let config = AppConfig {
        rate_limit_per_minute: 2,
        ..AppConfig::default()
    };
    let app = consurvey_api::app(AppState::with_config(config, None));
    for _ in 0..2 {
        let (status, _) = get(&app, "/v1/surveys/1").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = get(&app, "/v1/surveys/1").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // Probes sit outside the limiter.
    let (status, _) = get(&app, "/health/liveness").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_json_is_served() {
    let app = test_app();
    let (status, body) = get(&app, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/coupons/assign"].is_object());
    assert_eq!(body["info"]["title"], "Convention Survey API");
}
