//! SQLite-backed [`RecordStore`].
//!
//! `created_at` is stored as Unix milliseconds. SQLite serializes writers,
//! which covers the per-record write ordering the pipeline needs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::AnalysisRecord;

use super::RecordStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. The schema must already exist.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect using `[db]` and make sure the schema is in place.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: &SqliteRow) -> Result<AnalysisRecord> {
    let created_ms: i64 = row.get("created_at");
    let created_at = DateTime::from_timestamp_millis(created_ms)
        .with_context(|| format!("invalid created_at timestamp: {}", created_ms))?;
    Ok(AnalysisRecord {
        id: row.get("id"),
        source_url: row.get("source_url"),
        generated_text: row.get("generated_text"),
        created_at,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create(&self, record: &AnalysisRecord) -> Result<String> {
        sqlx::query(
            "INSERT INTO analyses (id, source_url, generated_text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.source_url)
        .bind(&record.generated_text)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert analysis {}", record.id))?;
        Ok(record.id.clone())
    }

    async fn list(&self) -> Result<Vec<AnalysisRecord>> {
        let rows = sqlx::query(
            "SELECT id, source_url, generated_text, created_at FROM analyses ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let row = sqlx::query(
            "SELECT id, source_url, generated_text, created_at FROM analyses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
