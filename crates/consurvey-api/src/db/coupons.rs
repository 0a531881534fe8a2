//! Coupon inventory and delivery persistence.
//!
//! Allocation is a single `UPDATE … WHERE id = (SELECT … FOR UPDATE SKIP
//! LOCKED)`, so concurrent requests never bind the same code. The partial
//! unique index on `coupon_codes(response_id)` keeps one code per response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use consurvey_core::coupon::normalize_code;
use consurvey_core::{
    CouponCode, CouponDelivery, CouponId, CouponStatus, DeliveryId, ImportReport, MarkAction,
    ResponseId,
};

use super::parse_column;
use crate::store::{NewDelivery, StoreCounts, StoreError};

const COUPON_COLUMNS: &str = "id, code, status, response_id, assigned_at, copied_at, emailed_at, \
     expires_at, notes, created_at";

/// Status computed from timestamps, mirroring `CouponCode::effective_status`.
const EFFECTIVE_STATUS: &str = "CASE
        WHEN expires_at < $1 THEN 'expired'
        WHEN copied_at IS NOT NULL OR emailed_at IS NOT NULL THEN 'used'
        ELSE 'available'
    END";

/// Bind the oldest eligible code to `response`, or return the one it holds.
pub async fn assign(
    pool: &PgPool,
    response: ResponseId,
    now: DateTime<Utc>,
) -> Result<Option<CouponCode>, StoreError> {
    if let Some(held) = held_by(pool, response).await? {
        return Ok(Some(held));
    }

    let claimed = sqlx::query_as::<_, CouponRow>(&format!(
        "UPDATE coupon_codes SET response_id = $1, assigned_at = $2
         WHERE id = (
             SELECT id FROM coupon_codes
             WHERE status = 'available'
               AND response_id IS NULL
               AND copied_at IS NULL
               AND emailed_at IS NULL
               AND expires_at > $2
             ORDER BY created_at, id
             LIMIT 1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING {COUPON_COLUMNS}"
    ))
    .bind(response.get())
    .bind(now)
    .fetch_optional(pool)
    .await;

    match claimed.map_err(StoreError::from) {
        Ok(row) => Ok(row.map(CouponRow::into_record)),
        // A concurrent request for the same response won the race.
        Err(StoreError::Conflict(_)) => Ok(held_by(pool, response).await?),
        Err(other) => Err(other),
    }
}

async fn held_by(pool: &PgPool, response: ResponseId) -> Result<Option<CouponCode>, sqlx::Error> {
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupon_codes WHERE response_id = $1"
    ))
    .bind(response.get())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(CouponRow::into_record))
}

/// Record a copy or email of `code`. `None` when the code is unknown.
/// Look up one code without locking it.
pub async fn find(pool: &PgPool, code: &str) -> Result<Option<CouponCode>, sqlx::Error> {
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupon_codes WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(CouponRow::into_record))
}

pub async fn mark(
    pool: &PgPool,
    code: &str,
    action: MarkAction,
    now: DateTime<Utc>,
) -> Result<Option<CouponCode>, StoreError> {
    let mut tx = pool.begin().await?;

    let Some(row) = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupon_codes WHERE code = $1 FOR UPDATE"
    ))
    .bind(code)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Ok(None);
    };

    let mut coupon = row.into_record();
    coupon.mark(action, now)?;

    sqlx::query("UPDATE coupon_codes SET status = $1, copied_at = $2, emailed_at = $3 WHERE id = $4")
        .bind(coupon.status.as_str())
        .bind(coupon.copied_at)
        .bind(coupon.emailed_at)
        .bind(coupon.id.get())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Some(coupon))
}

/// Insert a delivery, or merge into the existing one for (response, code).
pub async fn upsert_delivery(pool: &PgPool, new: &NewDelivery) -> Result<CouponDelivery, sqlx::Error> {
    let row = sqlx::query_as::<_, DeliveryRow>(
        "INSERT INTO coupon_deliveries (response_id, coupon_code, email_sent, email_address)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (response_id, coupon_code) DO UPDATE
             SET email_sent = coupon_deliveries.email_sent OR EXCLUDED.email_sent,
                 email_address = COALESCE(EXCLUDED.email_address, coupon_deliveries.email_address)
         RETURNING id, response_id, coupon_code, email_sent, email_address, delivered_at",
    )
    .bind(new.response_id.get())
    .bind(&new.coupon_code)
    .bind(new.email_sent)
    .bind(&new.email_address)
    .fetch_one(pool)
    .await?;
    Ok(row.into_record())
}

/// Bring stored statuses up to date, then list codes newest first.
pub async fn list(
    pool: &PgPool,
    status: Option<CouponStatus>,
    now: DateTime<Utc>,
) -> Result<Vec<CouponCode>, sqlx::Error> {
    let corrected = sqlx::query(&format!(
        "UPDATE coupon_codes SET status = {EFFECTIVE_STATUS} WHERE status <> {EFFECTIVE_STATUS}"
    ))
    .bind(now)
    .execute(pool)
    .await?;
    if corrected.rows_affected() > 0 {
        tracing::debug!(rows = corrected.rows_affected(), "corrected coupon statuses");
    }

    let rows = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupon_codes
         WHERE ($1::text IS NULL OR status = $1)
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(status.map(CouponStatus::as_str))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(CouponRow::into_record).collect())
}

/// Insert each code, rejecting blanks and codes already in the inventory.
pub async fn import(
    pool: &PgPool,
    codes: &[String],
    notes: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<ImportReport, sqlx::Error> {
    let mut report = ImportReport::default();
    for raw in codes {
        let Ok(code) = normalize_code(raw) else {
            report.reject(raw.as_str(), "empty code");
            continue;
        };
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "INSERT INTO coupon_codes (code, status, expires_at, notes)
             VALUES ($1, 'available', $2, $3)
             ON CONFLICT (code) DO NOTHING
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(&code)
        .bind(expires_at)
        .bind(notes)
        .fetch_optional(pool)
        .await?;
        match row {
            Some(row) => report.created.push(row.into_record()),
            None => report.reject(code, "already exists"),
        }
    }
    Ok(report)
}

pub async fn delete(pool: &PgPool, id: CouponId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM coupon_codes WHERE id = $1")
        .bind(id.get())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Response total and coupon totals by effective status.
pub async fn counts(pool: &PgPool, now: DateTime<Utc>) -> Result<StoreCounts, sqlx::Error> {
    let responses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM survey_responses")
        .fetch_one(pool)
        .await?;
    let by_status: Vec<(String, i64)> = sqlx::query_as(&format!(
        "SELECT {EFFECTIVE_STATUS} AS status, COUNT(*) FROM coupon_codes GROUP BY 1"
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;

    let mut coupons_by_status = HashMap::new();
    for (raw, count) in by_status {
        let status = parse_column("coupon_codes", 0, &raw, CouponStatus::Available);
        *coupons_by_status.entry(status).or_default() += count.max(0) as u64;
    }
    Ok(StoreCounts {
        responses: responses.max(0) as u64,
        coupons_by_status,
    })
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: i64,
    code: String,
    status: String,
    response_id: Option<i64>,
    assigned_at: Option<DateTime<Utc>>,
    copied_at: Option<DateTime<Utc>>,
    emailed_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl CouponRow {
    fn into_record(self) -> CouponCode {
        CouponCode {
            status: parse_column("coupon_codes", self.id, &self.status, CouponStatus::Available),
            id: CouponId::new(self.id),
            code: self.code,
            response_id: self.response_id.map(ResponseId::new),
            assigned_at: self.assigned_at,
            copied_at: self.copied_at,
            emailed_at: self.emailed_at,
            expires_at: self.expires_at,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: i64,
    response_id: i64,
    coupon_code: String,
    email_sent: bool,
    email_address: Option<String>,
    delivered_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_record(self) -> CouponDelivery {
        CouponDelivery {
            id: DeliveryId::new(self.id),
            response_id: ResponseId::new(self.response_id),
            coupon_code: self.coupon_code,
            email_sent: self.email_sent,
            email_address: self.email_address,
            delivered_at: self.delivered_at,
        }
    }
}
