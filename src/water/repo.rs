use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::water::repo_types::{NewWaterEntry, WaterChanges, WaterEntry};

/// Every lookup is scoped to `owner`; entries of other users are invisible.
#[async_trait]
pub trait WaterStore: Send + Sync {
    async fn insert(&self, entry: NewWaterEntry) -> anyhow::Result<WaterEntry>;
    async fn update_owned(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &WaterChanges,
    ) -> anyhow::Result<Option<WaterEntry>>;
    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<WaterEntry>>;
    /// Entries whose date contains `pattern`, newest date string first.
    async fn find_by_date_pattern(
        &self,
        owner: Uuid,
        pattern: &str,
    ) -> anyhow::Result<Vec<WaterEntry>>;
    /// Entries dated exactly `date`, earliest time first.
    async fn find_by_date(&self, owner: Uuid, date: &str) -> anyhow::Result<Vec<WaterEntry>>;
}

#[derive(Clone)]
pub struct PgWaterStore {
    db: PgPool,
}

impl PgWaterStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WaterStore for PgWaterStore {
    async fn insert(&self, entry: NewWaterEntry) -> anyhow::Result<WaterEntry> {
        let row = sqlx::query_as::<_, WaterEntry>(
            r#"
            INSERT INTO water_entries (owner, value, date, time)
            VALUES ($1, $2, $3, $4)
            RETURNING id, value, date, time, owner
            "#,
        )
        .bind(entry.owner)
        .bind(entry.value)
        .bind(&entry.date)
        .bind(&entry.time)
        .fetch_one(&self.db)
        .await
        .context("insert water entry")?;
        Ok(row)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &WaterChanges,
    ) -> anyhow::Result<Option<WaterEntry>> {
        let row = sqlx::query_as::<_, WaterEntry>(
            r#"
            UPDATE water_entries
               SET value = COALESCE($3, value),
                   date  = COALESCE($4, date),
                   time  = COALESCE($5, time)
             WHERE id = $1 AND owner = $2
            RETURNING id, value, date, time, owner
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.value)
        .bind(&changes.date)
        .bind(&changes.time)
        .fetch_optional(&self.db)
        .await
        .context("update water entry")?;
        Ok(row)
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<WaterEntry>> {
        let row = sqlx::query_as::<_, WaterEntry>(
            r#"
            DELETE FROM water_entries
             WHERE id = $1 AND owner = $2
            RETURNING id, value, date, time, owner
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("delete water entry")?;
        Ok(row)
    }

    async fn find_by_date_pattern(
        &self,
        owner: Uuid,
        pattern: &str,
    ) -> anyhow::Result<Vec<WaterEntry>> {
        let rows = sqlx::query_as::<_, WaterEntry>(
            r#"
            SELECT id, value, date, time, owner
              FROM water_entries
             WHERE owner = $1 AND strpos(date, $2) > 0
             ORDER BY date COLLATE "C" DESC
            "#,
        )
        .bind(owner)
        .bind(pattern)
        .fetch_all(&self.db)
        .await
        .context("list water entries by date pattern")?;
        Ok(rows)
    }

    async fn find_by_date(&self, owner: Uuid, date: &str) -> anyhow::Result<Vec<WaterEntry>> {
        let rows = sqlx::query_as::<_, WaterEntry>(
            r#"
            SELECT id, value, date, time, owner
              FROM water_entries
             WHERE owner = $1 AND date = $2
             ORDER BY time COLLATE "C" ASC
            "#,
        )
        .bind(owner)
        .bind(date)
        .fetch_all(&self.db)
        .await
        .context("list water entries by date")?;
        Ok(rows)
    }
}
