//! scribe-store: conversation persistence
//!
//! Record types for turns, report sections, and conversation metadata, the
//! `ConversationStore` contract the core writes through, and two backends:
//! an in-memory store and an append-only JSONL file store.

pub mod error;
pub mod jsonl;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use jsonl::JsonlStore;
pub use records::{ConversationMeta, Section, SectionStatus};
pub use store::{ConversationStore, MemoryStore};
