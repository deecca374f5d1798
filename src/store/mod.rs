//! Persistence of analysis records.
//!
//! The [`RecordStore`] trait is the only storage surface the pipeline and
//! server use, so backends are interchangeable:
//!
//! - [`SqliteStore`] — the default, backed by the `[db].path` database.
//! - [`MemoryStore`] — process-local, for tests and `rsum serve --memory`.
//!
//! Implementations must serialize writes to a single record themselves and be
//! `Send + Sync` so one instance can be shared by every concurrent run.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::AnalysisRecord;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend for analysis records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create`](RecordStore::create) | Persist a new record, returning its id |
/// | [`list`](RecordStore::list) | All records, most recent first |
/// | [`get`](RecordStore::get) | One record by id |
/// | [`delete_by_id`](RecordStore::delete_by_id) | Remove one record |
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, record: &AnalysisRecord) -> Result<String>;

    /// Most recent first; records created in the same millisecond come back
    /// newest-inserted first.
    async fn list(&self) -> Result<Vec<AnalysisRecord>>;

    async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>>;

    /// `true` if a record was removed, `false` if none had this id.
    async fn delete_by_id(&self, id: &str) -> Result<bool>;
}
