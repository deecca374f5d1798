//! Core data models used throughout the analysis pipeline.
//!
//! Traversal entries, candidates and the aggregate are ephemeral values owned
//! by a single run. [`AnalysisRecord`] is the only type that outlives a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry seen by the tree walker, relative to the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalEntry {
    pub relative_path: String,
    /// Lower-cased extension including the leading dot, or empty.
    pub extension: String,
    pub is_directory: bool,
}

/// A readable, eligible file waiting to be folded into the aggregate.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub relative_path: String,
    pub content: String,
    /// Length of `content` in characters.
    pub size: usize,
}

impl CandidateFile {
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let size = content.chars().count();
        Self {
            relative_path: relative_path.into(),
            content,
            size,
        }
    }
}

/// The bounded corpus handed to the generator.
#[derive(Debug, Clone, Default)]
pub struct AggregateContext {
    pub text: String,
    pub consumed_chars: usize,
    pub budget_chars: usize,
    /// Number of files folded in, including a truncated tail.
    pub files_included: usize,
    pub truncated: bool,
}

/// A persisted analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub source_url: String,
    pub generated_text: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// New record with a fresh UUID, timestamped now at millisecond precision
    /// so it survives a round trip through the store unchanged.
    pub fn new(source_url: impl Into<String>, generated_text: impl Into<String>) -> Self {
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        Self {
            id: Uuid::new_v4().to_string(),
            source_url: source_url.into(),
            generated_text: generated_text.into(),
            created_at,
        }
    }
}

/// Event delivered to the observer of a run.
///
/// Serializes to the wire shape of the streaming interface:
/// `{"type":"status","message":..}`, `{"type":"result","payload":..}`,
/// `{"type":"error","message":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Status { message: String },
    Result { payload: AnalysisRecord },
    Error { message: String },
}

impl PipelineEvent {
    pub fn status(message: impl Into<String>) -> Self {
        PipelineEvent::Status {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_size_counts_chars_not_bytes() {
        let c = CandidateFile::new("a.md", "héllo");
        assert_eq!(c.size, 5);
    }

    #[test]
    fn event_wire_shape() {
        let json = serde_json::to_value(PipelineEvent::status("reading")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "status", "message": "reading"}));

        let record = AnalysisRecord::new("https://github.com/a/b", "ok");
        let json = serde_json::to_value(PipelineEvent::Result {
            payload: record.clone(),
        })
        .unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["payload"]["id"], record.id.as_str());
        assert_eq!(json["payload"]["source_url"], "https://github.com/a/b");
    }

    #[test]
    fn only_status_is_non_terminal() {
        assert!(!PipelineEvent::status("x").is_terminal());
        assert!(PipelineEvent::Error {
            message: "boom".into()
        }
        .is_terminal());
    }
}
