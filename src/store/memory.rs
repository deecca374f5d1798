//! In-memory [`RecordStore`] for tests and throwaway servers.
//!
//! Records live in insertion order behind a `std::sync::RwLock`; nothing is
//! held across an await point.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::AnalysisRecord;

use super::RecordStore;

pub struct MemoryStore {
    records: RwLock<Vec<AnalysisRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, record: &AnalysisRecord) -> Result<String> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        if records.iter().any(|r| r.id == record.id) {
            bail!("record already exists: {}", record.id);
        }
        records.push(record.clone());
        Ok(record.id.clone())
    }

    async fn list(&self) -> Result<Vec<AnalysisRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        // Reverse insertion order first so the stable sort breaks
        // timestamp ties newest-inserted first.
        let mut out: Vec<AnalysisRecord> = records.iter().rev().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}
