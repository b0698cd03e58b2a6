//! Session registry: explicit dependency injection, one session per
//! conversation id

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use scribe_ai::GenerationSource;
use scribe_store::ConversationStore;

use crate::{
    history::History,
    session::Session,
    sink::EventSink,
    supervisor::{Supervisor, SupervisorConfig},
};

/// Owns every live conversation session.
///
/// Constructed once at process start and passed by handle wherever sessions
/// are needed; there is no hidden global state.
pub struct SessionRegistry {
    source: Arc<dyn GenerationSource>,
    store: Arc<dyn ConversationStore>,
    sink: Arc<dyn EventSink>,
    config: SupervisorConfig,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(
        source: Arc<dyn GenerationSource>,
        store: Arc<dyn ConversationStore>,
        sink: Arc<dyn EventSink>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the session for a conversation, creating it (and loading its
    /// persisted history) on first access.
    pub async fn get_or_create(&self, conversation_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.lock().get(conversation_id) {
            return Arc::clone(session);
        }

        let turns = match self.store.load_history(conversation_id).await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(
                    conversation = %conversation_id,
                    error = %e,
                    "failed to load history; starting empty"
                );
                Vec::new()
            }
        };
        tracing::info!(
            conversation = %conversation_id,
            turns = turns.len(),
            "session created"
        );

        let history = Arc::new(History::from_turns(turns));
        let supervisor = Supervisor::new(
            conversation_id,
            self.config.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            history,
        );
        let session = Arc::new(Session::new(
            conversation_id,
            supervisor,
            Arc::clone(&self.sink),
        ));

        // If two callers raced here, the first insert wins.
        let mut sessions = self.sessions.lock();
        Arc::clone(
            sessions
                .entry(conversation_id.to_string())
                .or_insert(session),
        )
    }

    /// Drop a session from the registry (its history stays persisted)
    pub fn remove(&self, conversation_id: &str) -> bool {
        self.sessions.lock().remove(conversation_id).is_some()
    }

    /// Ids of all live sessions
    pub fn active_conversations(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use async_trait::async_trait;
    use scribe_ai::{Fragment, FragmentStream, GenerationParams, Turn};
    use scribe_store::MemoryStore;
    use tokio_util::sync::CancellationToken;

    struct SilentSource;

    #[async_trait]
    impl GenerationSource for SilentSource {
        async fn generate(
            &self,
            _turns: Vec<Turn>,
            _params: &GenerationParams,
            _cancel: CancellationToken,
        ) -> scribe_ai::Result<FragmentStream> {
            Ok(Box::pin(tokio_stream::once(Ok(Fragment::Completion))))
        }
    }

    fn registry(store: Arc<dyn ConversationStore>) -> SessionRegistry {
        let (sink, _rx) = ChannelSink::new();
        SessionRegistry::new(
            Arc::new(SilentSource),
            store,
            Arc::new(sink),
            SupervisorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_same_id_returns_same_session() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let a = registry.get_or_create("c1").await;
        let b = registry.get_or_create("c1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_ids_are_independent() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let a = registry.get_or_create("c1").await;
        let b = registry.get_or_create("c2").await;
        assert!(!Arc::ptr_eq(&a, &b));

        let mut ids = registry.active_conversations();
        ids.sort();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_history_loaded_on_first_access() {
        let store = Arc::new(MemoryStore::new());
        store.append_turn("c1", &Turn::user("earlier")).await.unwrap();
        store.append_turn("c1", &Turn::assistant("reply")).await.unwrap();

        let registry = registry(Arc::clone(&store) as _);
        let session = registry.get_or_create("c1").await;
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_forgets_session() {
        let registry = registry(Arc::new(MemoryStore::new()));
        registry.get_or_create("c1").await;
        assert!(registry.remove("c1"));
        assert!(!registry.remove("c1"));
        assert!(registry.is_empty());
    }
}
