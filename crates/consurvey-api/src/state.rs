//! # Application State
//!
//! Shared state handed to every handler: runtime configuration, the
//! persistence backend, and the mailer.

use std::str::FromStr;
use std::sync::Arc;

use consurvey_core::coupon::DEFAULT_VALIDITY_DAYS;
use consurvey_core::survey::DEFAULT_SURVEY_ID;
use consurvey_core::SurveyId;
use sqlx::PgPool;

use crate::mailer::{LogMailer, Mailer};
use crate::store::SurveyStore;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Survey used by admin endpoints when no `survey_id` is given.
    pub default_survey_id: SurveyId,
    /// Lifetime of imported coupon codes.
    pub coupon_validity_days: i64,
    /// Requests allowed per client per minute.
    pub rate_limit_per_minute: u64,
    /// Whether `/metrics` and the metrics middleware are mounted.
    pub metrics_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            default_survey_id: DEFAULT_SURVEY_ID,
            coupon_validity_days: DEFAULT_VALIDITY_DAYS,
            rate_limit_per_minute: 600,
            metrics_enabled: true,
        }
    }
}

impl AppConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_or("PORT", defaults.port),
            default_survey_id: env_or("CONSURVEY_DEFAULT_SURVEY_ID", defaults.default_survey_id),
            coupon_validity_days: env_or(
                "CONSURVEY_COUPON_VALIDITY_DAYS",
                defaults.coupon_validity_days,
            ),
            rate_limit_per_minute: env_or(
                "CONSURVEY_RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            ),
            metrics_enabled: std::env::var("CONSURVEY_METRICS_ENABLED")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable value");
            default
        }),
        Err(_) => default,
    }
}

/// State shared across handlers. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: SurveyStore,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State over Postgres when a pool is given, otherwise in-memory.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let store = match db_pool {
            Some(pool) => SurveyStore::Postgres(pool),
            None => SurveyStore::memory(),
        };
        Self {
            config,
            store,
            mailer: Arc::new(LogMailer),
        }
    }

    /// Replace the mailer.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
