//! Persistent record types

use serde::{Deserialize, Serialize};

/// Lifecycle of a report section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Just generated
    Draft,
    /// Waiting for user feedback
    Pending,
    /// Accepted by the user
    Confirmed,
    /// Being revised
    Editing,
    /// Needs rework
    Rejected,
}

/// One section of a report. The core persists and reloads these; it never
/// interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub status: SectionStatus,
    /// Position within the report
    pub order: u32,
    /// Incremented on every rewrite
    pub version: u32,
    /// Unix-millis of the last change
    pub updated_at: i64,
}

impl Section {
    /// Create a fresh draft section
    pub fn draft(title: impl Into<String>, order: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            content: String::new(),
            status: SectionStatus::Draft,
            order,
            version: 1,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Conversation-level metadata written once per log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub conversation_id: String,
    pub created_at: i64,
}

impl ConversationMeta {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
