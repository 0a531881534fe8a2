//! # consurvey-api — Axum API for the Convention Survey Stack
//!
//! Serves the attendee questionnaire, hands out coupon codes, and gives
//! staff an administration surface over the same data.
//!
//! ## API Surface
//!
//! | Prefix | Module | Domain |
//! |--------|--------|--------|
//! | `/v1/surveys/*` | [`routes::survey`] | Survey definition, narrowing, responses |
//! | `/v1/gm-interest` | [`routes::survey`] | GM volunteer contact |
//! | `/v1/coupons/*` | [`routes::coupons`] | Allocation, use marking, delivery |
//! | `/v1/admin/coupons*` | [`routes::coupons`] | Coupon inventory |
//! | `/v1/admin/questions`, `/v1/admin/options*` | [`routes::options`] | Options |
//! | `/v1/admin/gm-*` | [`routes::associations`] | GM assignments |
//! | `/v1/admin/responses`, `/v1/admin/export/*`, `/v1/admin/gm-interest*` | [`routes::responses`] | Responses and export |
//! | `/v1/admin/ratings`, `/v1/admin/conventions`, `/v1/admin/adventures` | [`routes::analytics`] | Analytics |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → RateLimitMiddleware → Handler
//! ```
//!
//! There is no auth middleware. `/v1/admin/*` is meant to sit behind a
//! gateway.

pub mod db;
pub mod error;
pub mod extractors;
pub mod mailer;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod store;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use chrono::Utc;
use consurvey_core::CouponStatus;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;
use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter};
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside the rate limiter.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests: state.config.rate_limit_per_minute,
        ..RateLimitConfig::default()
    });
    let metrics_on = state.config.metrics_enabled;

    let api = Router::new()
        .merge(routes::survey::router())
        .merge(routes::coupons::router())
        .merge(routes::options::router())
        .merge(routes::associations::router())
        .merge(routes::responses::router())
        .merge(routes::analytics::router())
        .merge(openapi::router());

    // Body size limit: 2 MiB.
    let mut api = api
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(limiter))
        .with_state(state.clone());

    let mut probes = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        probes = probes
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let probes = probes.with_state(state);

    Router::new().merge(probes).merge(api)
}

/// GET /metrics
///
/// Refreshes the survey gauges from the store on each scrape, then encodes
/// everything in Prometheus text format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    match state.store.counts(Utc::now()).await {
        Ok(counts) => {
            metrics.responses_total().set(counts.responses as f64);
            metrics.coupons_total().reset();
            for status in [CouponStatus::Available, CouponStatus::Used, CouponStatus::Expired] {
                let n = counts.coupons_by_status.get(&status).copied().unwrap_or(0);
                metrics
                    .coupons_total()
                    .with_label_values(&[status.as_str()])
                    .set(n as f64);
            }
        }
        // Stale gauges are still worth scraping.
        Err(e) => tracing::warn!("failed to refresh survey gauges: {e}"),
    }

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe. 200 whenever the process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Pings the database when one is configured.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.store.ping().await {
        tracing::warn!("database health check failed: {e}");
        return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}
