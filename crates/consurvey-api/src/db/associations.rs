//! GM × convention × adventure assignment persistence.
//!
//! The composite foreign key on `gm_adventures` keeps every adventure row
//! under an assigned (gm, convention) pair, and deleting the pair cascades.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use consurvey_core::{AssignmentId, GmAdventure, GmConvention, OptionId};

pub async fn list_gm_conventions(pool: &PgPool) -> Result<Vec<GmConvention>, sqlx::Error> {
    let rows = sqlx::query_as::<_, GmConventionRow>(
        "SELECT id, gm_option_id, convention_option_id, created_at
         FROM gm_conventions ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(GmConventionRow::into_record).collect())
}

pub async fn list_gm_adventures(pool: &PgPool) -> Result<Vec<GmAdventure>, sqlx::Error> {
    let rows = sqlx::query_as::<_, GmAdventureRow>(
        "SELECT id, gm_option_id, convention_option_id, adventure_option_id, created_at
         FROM gm_adventures ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(GmAdventureRow::into_record).collect())
}

pub async fn insert_gm_convention(
    pool: &PgPool,
    gm: OptionId,
    convention: OptionId,
) -> Result<GmConvention, sqlx::Error> {
    let row = sqlx::query_as::<_, GmConventionRow>(
        "INSERT INTO gm_conventions (gm_option_id, convention_option_id) VALUES ($1, $2)
         RETURNING id, gm_option_id, convention_option_id, created_at",
    )
    .bind(gm.get())
    .bind(convention.get())
    .fetch_one(pool)
    .await?;
    Ok(row.into_record())
}

/// Delete a pair. Its adventure rows go with it.
pub async fn delete_gm_convention(pool: &PgPool, id: AssignmentId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM gm_conventions WHERE id = $1")
        .bind(id.get())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_gm_adventure(
    pool: &PgPool,
    gm: OptionId,
    convention: OptionId,
    adventure: OptionId,
) -> Result<GmAdventure, sqlx::Error> {
    let row = sqlx::query_as::<_, GmAdventureRow>(
        "INSERT INTO gm_adventures (gm_option_id, convention_option_id, adventure_option_id)
         VALUES ($1, $2, $3)
         RETURNING id, gm_option_id, convention_option_id, adventure_option_id, created_at",
    )
    .bind(gm.get())
    .bind(convention.get())
    .bind(adventure.get())
    .fetch_one(pool)
    .await?;
    Ok(row.into_record())
}

pub async fn delete_gm_adventure(pool: &PgPool, id: AssignmentId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM gm_adventures WHERE id = $1")
        .bind(id.get())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct GmConventionRow {
    id: i64,
    gm_option_id: i64,
    convention_option_id: i64,
    created_at: DateTime<Utc>,
}

impl GmConventionRow {
    fn into_record(self) -> GmConvention {
        GmConvention {
            id: AssignmentId::new(self.id),
            gm_option_id: OptionId::new(self.gm_option_id),
            convention_option_id: OptionId::new(self.convention_option_id),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GmAdventureRow {
    id: i64,
    gm_option_id: i64,
    convention_option_id: i64,
    adventure_option_id: i64,
    created_at: DateTime<Utc>,
}

impl GmAdventureRow {
    fn into_record(self) -> GmAdventure {
        GmAdventure {
            id: AssignmentId::new(self.id),
            gm_option_id: OptionId::new(self.gm_option_id),
            convention_option_id: OptionId::new(self.convention_option_id),
            adventure_option_id: OptionId::new(self.adventure_option_id),
            created_at: self.created_at,
        }
    }
}
