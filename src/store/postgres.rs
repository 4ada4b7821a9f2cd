use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use super::{meals_from_document, DayMutator, DayStore, StoredDay};
use crate::error::AppError;

#[derive(Debug, FromRow)]
struct DayRow {
    day: String,
    data: Json<Value>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<DayRow> for StoredDay {
    fn from(r: DayRow) -> Self {
        Self {
            data: meals_from_document(&r.day, r.data.0),
            day: r.day,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Day documents in the `meals_by_day` table, one jsonb row per day.
#[derive(Clone)]
pub struct PgDayStore {
    db: PgPool,
}

impl PgDayStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Per-day writer lock, held until the transaction ends. Also covers
    /// days with no row yet.
    async fn lock_day(tx: &mut Transaction<'_, Postgres>, day: &str) -> Result<(), AppError> {
        sqlx::query(r#"SELECT pg_advisory_xact_lock(hashtext($1))"#)
            .bind(day)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn upsert_tx(
        tx: &mut Transaction<'_, Postgres>,
        day: &str,
        meals: Vec<Value>,
    ) -> Result<StoredDay, AppError> {
        let row = sqlx::query_as::<_, DayRow>(
            r#"
            INSERT INTO meals_by_day (day, data)
            VALUES ($1, $2)
            ON CONFLICT (day) DO UPDATE
               SET data = EXCLUDED.data,
                   updated_at = clock_timestamp()
            RETURNING day, data, created_at, updated_at
            "#,
        )
        .bind(day)
        .bind(Json(Value::Array(meals)))
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl DayStore for PgDayStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn get_all_days(&self) -> Result<BTreeMap<String, Vec<Value>>, AppError> {
        let rows = sqlx::query_as::<_, (String, Json<Value>)>(
            r#"SELECT day, data FROM meals_by_day"#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, data)| {
                let meals = meals_from_document(&day, data.0);
                (day, meals)
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_day(&self, day: &str) -> Result<Option<Vec<Value>>, AppError> {
        let row = sqlx::query_as::<_, (Json<Value>,)>(
            r#"SELECT data FROM meals_by_day WHERE day = $1 LIMIT 1"#,
        )
        .bind(day)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(data,)| meals_from_document(day, data.0)))
    }

    #[instrument(skip(self, meals), fields(len = meals.len()))]
    async fn upsert_day(&self, day: &str, meals: Vec<Value>) -> Result<StoredDay, AppError> {
        let mut tx = self.db.begin().await?;
        Self::lock_day(&mut tx, day).await?;
        let stored = Self::upsert_tx(&mut tx, day, meals).await?;
        tx.commit().await?;
        debug!(day = %stored.day, "day upserted");
        Ok(stored)
    }

    #[instrument(skip(self, mutate))]
    async fn modify_day(&self, day: &str, mutate: DayMutator) -> Result<StoredDay, AppError> {
        let mut tx = self.db.begin().await?;
        Self::lock_day(&mut tx, day).await?;

        let current = sqlx::query_as::<_, (Json<Value>,)>(
            r#"SELECT data FROM meals_by_day WHERE day = $1"#,
        )
        .bind(day)
        .fetch_optional(&mut *tx)
        .await?
        .map(|(data,)| meals_from_document(day, data.0))
        .unwrap_or_default();

        // Dropping `tx` on error rolls back and releases the lock.
        let next = mutate(current)?;
        let stored = Self::upsert_tx(&mut tx, day, next).await?;
        tx.commit().await?;
        debug!(day = %stored.day, "day modified");
        Ok(stored)
    }
}
