//! PostgreSQL vibe repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use super::VibeRepository;
use crate::models::{NewVibe, Vibe, VibeFilter, VibeStatus};

const VIBE_COLUMNS: &str = "id, user_id, mood_bucket, mood_slider, mood_text, latitude, longitude, \
     address, timer_seconds, start_time, end_time, created_at, is_active, status";

/// Vibe repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgVibeRepository {
    pool: PgPool,
}

impl PgVibeRepository {
    /// Create a new vibe repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn vibe_from_row(row: &PgRow) -> Result<Vibe, sqlx::Error> {
    let mood_bucket: String = row.try_get("mood_bucket")?;
    let status: String = row.try_get("status")?;

    Ok(Vibe {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        mood_bucket: mood_bucket
            .parse()
            .map_err(|_| decode_error(format!("unknown mood bucket: {}", mood_bucket)))?,
        mood_slider: row.try_get("mood_slider")?,
        mood_text: row.try_get("mood_text")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        address: row.try_get("address")?,
        timer_seconds: row.try_get("timer_seconds")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        created_at: row.try_get("created_at")?,
        is_active: row.try_get("is_active")?,
        status: status
            .parse()
            .map_err(|_| decode_error(format!("unknown vibe status: {}", status)))?,
    })
}

#[async_trait]
impl VibeRepository for PgVibeRepository {
    async fn insert(&self, vibe: &NewVibe) -> DatabaseResult<Vibe> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO vibes (user_id, mood_bucket, mood_slider, mood_text, latitude, longitude,
                               address, timer_seconds, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            VIBE_COLUMNS
        ))
        .bind(vibe.user_id)
        .bind(vibe.mood_bucket.as_str())
        .bind(vibe.mood_slider)
        .bind(&vibe.mood_text)
        .bind(vibe.latitude)
        .bind(vibe.longitude)
        .bind(&vibe.address)
        .bind(vibe.timer_seconds)
        .bind(vibe.start_time)
        .bind(vibe.end_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(vibe_from_row(&row)?)
    }

    async fn history(&self, user_id: Uuid, filter: &VibeFilter) -> DatabaseResult<Vec<Vibe>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM vibes WHERE user_id = ", VIBE_COLUMNS));
        query.push_bind(user_id);

        if let Some(status) = &filter.status {
            query.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(is_active) = filter.is_active {
            query.push(" AND is_active = ").push_bind(is_active);
        }
        if let Some(mood_bucket) = &filter.mood_bucket {
            query.push(" AND mood_bucket = ").push_bind(mood_bucket.clone());
        }
        if let Some(start_after) = filter.start_after {
            query.push(" AND start_time >= ").push_bind(start_after);
        }
        if let Some(end_before) = filter.end_before {
            query.push(" AND end_time <= ").push_bind(end_before);
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let vibes = rows.iter().map(vibe_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(vibes)
    }

    async fn find_for_user(&self, user_id: Uuid, id: i64) -> DatabaseResult<Option<Vibe>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM vibes WHERE id = $1 AND user_id = $2",
            VIBE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(vibe_from_row).transpose()?)
    }

    async fn latest_running(&self, user_id: Uuid, now: DateTime<Utc>) -> DatabaseResult<Option<Vibe>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM vibes
            WHERE user_id = $1 AND is_active AND end_time > $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
            VIBE_COLUMNS
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(vibe_from_row).transpose()?)
    }

    async fn close(&self, user_id: Uuid, id: i64, status: VibeStatus) -> DatabaseResult<Option<Vibe>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE vibes
            SET status = $1, is_active = FALSE
            WHERE id = $2 AND user_id = $3 AND is_active
            RETURNING {}
            "#,
            VIBE_COLUMNS
        ))
        .bind(status.as_str())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(vibe_from_row).transpose()?)
    }

    async fn expire_due(&self, now: DateTime<Utc>, user_id: Option<Uuid>) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE vibes
            SET status = 'expired', is_active = FALSE
            WHERE is_active AND end_time <= $1 AND ($2::uuid IS NULL OR user_id = $2)
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
