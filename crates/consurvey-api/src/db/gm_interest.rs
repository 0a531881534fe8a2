//! GM volunteer contact persistence. One row per response.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use consurvey_core::{GmContact, GmInterest, GmInterestId, GmInterestRow, ResponseId};

/// Insert or replace the contact of a response.
pub async fn upsert(
    pool: &PgPool,
    response: ResponseId,
    contact: &GmContact,
) -> Result<GmInterest, sqlx::Error> {
    let row = sqlx::query_as::<_, GmInterestDbRow>(
        "INSERT INTO gm_interest (response_id, first_name, last_name, email)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (response_id) DO UPDATE
             SET first_name = EXCLUDED.first_name,
                 last_name = EXCLUDED.last_name,
                 email = EXCLUDED.email
         RETURNING id, response_id, first_name, last_name, email, created_at, NULL::timestamptz AS submitted_at",
    )
    .bind(response.get())
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.email)
    .fetch_one(pool)
    .await?;
    Ok(row.into_record().interest)
}

/// Every record with its response's submission time.
pub async fn list(pool: &PgPool) -> Result<Vec<GmInterestRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, GmInterestDbRow>(
        "SELECT g.id, g.response_id, g.first_name, g.last_name, g.email, g.created_at,
                r.submitted_at
         FROM gm_interest g LEFT JOIN survey_responses r ON r.id = g.response_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(GmInterestDbRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct GmInterestDbRow {
    id: i64,
    response_id: i64,
    first_name: String,
    last_name: String,
    email: String,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
}

impl GmInterestDbRow {
    fn into_record(self) -> GmInterestRow {
        GmInterestRow {
            interest: GmInterest {
                id: GmInterestId::new(self.id),
                response_id: ResponseId::new(self.response_id),
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                created_at: self.created_at,
            },
            submitted_at: self.submitted_at,
        }
    }
}
