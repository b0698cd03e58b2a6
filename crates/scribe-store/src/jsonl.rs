//! Append-only JSONL file store
//!
//! One file per conversation under the data directory. Every write appends a
//! tagged entry; loads replay the log. Section entries are last-write-wins
//! per section id, which keeps writes O(1) at the cost of log growth.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use scribe_ai::Turn;

use crate::{
    error::Result,
    records::{ConversationMeta, Section},
    store::ConversationStore,
};

/// Entry types for the JSONL log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LogEntry {
    /// Conversation metadata, written when the log is created
    Meta(ConversationMeta),
    /// One conversation turn
    Turn { turn: Turn },
    /// A section snapshot (latest per id wins)
    Section { section: Section },
}

/// File-backed store writing one JSONL log per conversation
pub struct JsonlStore {
    root: PathBuf,
}

impl JsonlStore {
    /// Default data directory
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scribe")
            .join("conversations")
    }

    /// Create a store rooted at the default data directory
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_root())
    }

    /// Create a store rooted at the given directory, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn log_path(&self, conversation_id: &str) -> PathBuf {
        // Conversation ids are uuids in practice; sanitize anything else so a
        // caller-supplied id cannot escape the root.
        let safe: String = conversation_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.jsonl", safe))
    }

    fn append_entry(&self, conversation_id: &str, entry: &LogEntry) -> Result<()> {
        let path = self.log_path(conversation_id);
        let mut file = if path.exists() {
            OpenOptions::new().append(true).open(&path)?
        } else {
            let mut file = File::create(&path)?;
            let meta = LogEntry::Meta(ConversationMeta::new(conversation_id));
            writeln!(file, "{}", serde_json::to_string(&meta)?)?;
            file
        };
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    fn read_entries(&self, conversation_id: &str) -> Result<Vec<LogEntry>> {
        let path = self.log_path(conversation_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_log(&path)
    }
}

fn read_log(path: &Path) -> Result<Vec<LogEntry>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                // A torn trailing line (crash mid-write) loses one record,
                // not the whole conversation.
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable log entry");
            }
        }
    }

    Ok(entries)
}

#[async_trait]
impl ConversationStore for JsonlStore {
    async fn append_turn(&self, conversation_id: &str, turn: &Turn) -> Result<()> {
        self.append_entry(conversation_id, &LogEntry::Turn { turn: turn.clone() })
    }

    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        Ok(self
            .read_entries(conversation_id)?
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Turn { turn } => Some(turn),
                _ => None,
            })
            .collect())
    }

    async fn load_sections(&self, conversation_id: &str) -> Result<Vec<Section>> {
        let mut latest: HashMap<String, Section> = HashMap::new();
        for entry in self.read_entries(conversation_id)? {
            if let LogEntry::Section { section } = entry {
                latest.insert(section.id.clone(), section);
            }
        }
        let mut sections: Vec<Section> = latest.into_values().collect();
        sections.sort_by_key(|s| s.order);
        Ok(sections)
    }

    async fn save_section(&self, conversation_id: &str, section: &Section) -> Result<()> {
        self.append_entry(
            conversation_id,
            &LogEntry::Section {
                section: section.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SectionStatus;

    fn store() -> (tempfile::TempDir, JsonlStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_turn_roundtrip() {
        let (_dir, store) = store();
        store.append_turn("c1", &Turn::user("write about owls")).await.unwrap();
        store.append_turn("c1", &Turn::assistant("Owls are...")).await.unwrap();

        let history = store.load_history("c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "write about owls");
        assert_eq!(history[1].content, "Owls are...");
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let (_dir, store) = store();
        assert!(store.load_history("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_starts_with_meta_entry() {
        let (dir, store) = store();
        store.append_turn("c1", &Turn::user("hi")).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("c1.jsonl")).unwrap();
        let first = content.lines().next().unwrap();
        assert!(first.contains(r#""type":"meta""#), "got: {}", first);
    }

    #[tokio::test]
    async fn test_section_last_write_wins() {
        let (_dir, store) = store();
        let mut section = Section::draft("Intro", 0);
        store.save_section("c1", &section).await.unwrap();

        section.content = "final text".into();
        section.status = SectionStatus::Confirmed;
        section.version = 3;
        store.save_section("c1", &section).await.unwrap();

        let sections = store.load_sections("c1").await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "final text");
        assert_eq!(sections[0].version, 3);
    }

    #[tokio::test]
    async fn test_torn_trailing_line_is_skipped() {
        let (dir, store) = store();
        store.append_turn("c1", &Turn::user("hi")).await.unwrap();

        // Simulate a crash mid-write
        let path = dir.path().join("c1.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"type\":\"turn\",\"turn\":{{\"role\":\"us").unwrap();
        drop(file);

        let history = store.load_history("c1").await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_hostile_conversation_id_stays_in_root() {
        let (dir, store) = store();
        store.append_turn("../../etc/passwd", &Turn::user("x")).await.unwrap();

        // Everything written stayed under the store root
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
