//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx, used when `DATABASE_URL` is set. Without
//! it the API runs on the in-memory store and nothing survives a restart.
//!
//! Each submodule owns one group of tables and takes a `&PgPool`. Row
//! structs are private to their module and convert into the domain types
//! from `consurvey-core`.

pub mod associations;
pub mod coupons;
pub mod gm_interest;
pub mod responses;
pub mod surveys;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running with the in-memory store. \
                 Responses and coupons will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

/// Parse a stored enum column, logging and falling back on unknown values.
pub(crate) fn parse_column<T>(table: &'static str, id: i64, raw: &str, fallback: T) -> T
where
    T: std::str::FromStr,
{
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(table, id, value = raw, "unknown enum value in database");
        fallback
    })
}
