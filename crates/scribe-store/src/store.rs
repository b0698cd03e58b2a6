//! Store contract and in-memory backend

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use scribe_ai::Turn;

use crate::{error::Result, records::Section};

/// Persistence contract consumed by the conversation core.
///
/// Implementations are free to be eventually consistent; the core treats
/// every failure here as degraded-mode, never fatal.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one turn to a conversation's log
    async fn append_turn(&self, conversation_id: &str, turn: &Turn) -> Result<()>;

    /// Load the full ordered history of a conversation (empty if unknown)
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Turn>>;

    /// Load all sections of a conversation, in report order
    async fn load_sections(&self, conversation_id: &str) -> Result<Vec<Section>>;

    /// Insert or replace a section record
    async fn save_section(&self, conversation_id: &str, section: &Section) -> Result<()>;
}

#[derive(Default)]
struct MemoryRecords {
    turns: Vec<Turn>,
    sections: Vec<Section>,
}

/// In-memory store, used in tests and as a no-setup default
#[derive(Default)]
pub struct MemoryStore {
    conversations: Mutex<HashMap<String, MemoryRecords>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of turns stored for a conversation
    pub fn turn_count(&self, conversation_id: &str) -> usize {
        self.conversations
            .lock()
            .get(conversation_id)
            .map_or(0, |r| r.turns.len())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append_turn(&self, conversation_id: &str, turn: &Turn) -> Result<()> {
        self.conversations
            .lock()
            .entry(conversation_id.to_string())
            .or_default()
            .turns
            .push(turn.clone());
        Ok(())
    }

    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        Ok(self
            .conversations
            .lock()
            .get(conversation_id)
            .map(|r| r.turns.clone())
            .unwrap_or_default())
    }

    async fn load_sections(&self, conversation_id: &str) -> Result<Vec<Section>> {
        let mut sections = self
            .conversations
            .lock()
            .get(conversation_id)
            .map(|r| r.sections.clone())
            .unwrap_or_default();
        sections.sort_by_key(|s| s.order);
        Ok(sections)
    }

    async fn save_section(&self, conversation_id: &str, section: &Section) -> Result<()> {
        let mut conversations = self.conversations.lock();
        let records = conversations.entry(conversation_id.to_string()).or_default();
        match records.sections.iter_mut().find(|s| s.id == section.id) {
            Some(existing) => *existing = section.clone(),
            None => records.sections.push(section.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SectionStatus;

    #[tokio::test]
    async fn test_memory_store_turn_roundtrip() {
        let store = MemoryStore::new();
        store.append_turn("c1", &Turn::user("hello")).await.unwrap();
        store.append_turn("c1", &Turn::assistant("hi")).await.unwrap();

        let history = store.load_history("c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].content, "hi");
    }

    #[tokio::test]
    async fn test_memory_store_unknown_conversation_is_empty() {
        let store = MemoryStore::new();
        assert!(store.load_history("nope").await.unwrap().is_empty());
        assert!(store.load_sections("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_save_section_replaces_by_id() {
        let store = MemoryStore::new();
        let mut section = Section::draft("Intro", 0);
        store.save_section("c1", &section).await.unwrap();

        section.content = "revised".into();
        section.status = SectionStatus::Confirmed;
        section.version = 2;
        store.save_section("c1", &section).await.unwrap();

        let sections = store.load_sections("c1").await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "revised");
        assert_eq!(sections[0].version, 2);
    }

    #[tokio::test]
    async fn test_memory_store_sections_sorted_by_order() {
        let store = MemoryStore::new();
        store.save_section("c1", &Section::draft("Second", 1)).await.unwrap();
        store.save_section("c1", &Section::draft("First", 0)).await.unwrap();

        let sections = store.load_sections("c1").await.unwrap();
        assert_eq!(sections[0].title, "First");
        assert_eq!(sections[1].title, "Second");
    }
}
