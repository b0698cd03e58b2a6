//! Conversation session: the composition root for one conversation

use std::sync::Arc;

use futures::StreamExt;

use crate::{
    error::{Error, Result},
    events::{EventStream, OutboundEvent},
    history::History,
    phase::ConversationPhase,
    sink::EventSink,
    supervisor::Supervisor,
};

/// Wires one conversation's history, supervisor, and event sink.
///
/// `handle_user_turn` is the single inbound entry point used by transports;
/// each call yields a lazy event sequence of the form `chunk*` followed by
/// exactly one terminal event (or a single synthetic event for
/// short-circuiting inputs).
pub struct Session {
    conversation_id: String,
    supervisor: Supervisor,
    sink: Arc<dyn EventSink>,
}

impl Session {
    pub(crate) fn new(
        conversation_id: impl Into<String>,
        supervisor: Supervisor,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            supervisor,
            sink,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn phase(&self) -> ConversationPhase {
        self.supervisor.phase()
    }

    pub fn history(&self) -> Arc<History> {
        self.supervisor.history()
    }

    /// Process one piece of free-form user input
    pub async fn handle_user_turn(&self, text: &str) -> EventStream {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return OutboundEvent::Error {
                message: "message must not be empty".to_string(),
            }
            .into_stream();
        }
        self.supervisor.handle_input(trimmed).await
    }

    /// Process an explicit decision reply (approve-style client events)
    pub async fn handle_decision(&self, reply: &str) -> EventStream {
        self.supervisor.resolve_decision(reply.trim()).await
    }

    /// Suspend the calling flow on a user decision: emits a `prompt` event,
    /// parks the conversation in `AwaitingUser`, and resolves with the
    /// user's eventual reply.
    pub async fn ask_user(&self, question: &str, options: Vec<String>) -> Result<String> {
        let rx = self.supervisor.park_decision()?;
        self.sink
            .emit(
                &self.conversation_id,
                &OutboundEvent::Prompt {
                    question: question.to_string(),
                    options,
                },
            )
            .await;
        rx.await.map_err(|_| Error::DecisionDropped)
    }

    /// Drain a turn's events into the sink, preserving emission order
    pub async fn forward(&self, mut events: EventStream) {
        while let Some(event) = events.next().await {
            self.sink.emit(&self.conversation_id, &event).await;
        }
    }

    /// Handle input and forward everything it produces to the sink
    pub async fn dispatch(&self, text: &str) {
        let events = self.handle_user_turn(text).await;
        self.forward(events).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sink::ChannelSink,
        supervisor::SupervisorConfig,
    };
    use async_stream::stream;
    use async_trait::async_trait;
    use scribe_ai::{Fragment, FragmentStream, GenerationParams, GenerationSource, Turn};
    use scribe_store::MemoryStore;
    use tokio_util::sync::CancellationToken;

    /// Yields one canned reply, token by token
    struct CannedSource {
        tokens: Vec<&'static str>,
    }

    #[async_trait]
    impl GenerationSource for CannedSource {
        async fn generate(
            &self,
            _turns: Vec<Turn>,
            _params: &GenerationParams,
            _cancel: CancellationToken,
        ) -> scribe_ai::Result<FragmentStream> {
            let tokens = self.tokens.clone();
            Ok(Box::pin(stream! {
                for t in tokens {
                    yield Ok(Fragment::token(t));
                }
                yield Ok(Fragment::Completion);
            }))
        }
    }

    fn session_with(tokens: Vec<&'static str>) -> (Arc<Session>, tokio::sync::mpsc::UnboundedReceiver<(String, OutboundEvent)>) {
        let (sink, rx) = ChannelSink::new();
        let sink: Arc<dyn EventSink> = Arc::new(sink);
        let history = Arc::new(History::new());
        let supervisor = Supervisor::new(
            "conv-1",
            SupervisorConfig::default(),
            Arc::new(CannedSource { tokens }),
            Arc::new(MemoryStore::new()),
            history,
        );
        (Arc::new(Session::new("conv-1", supervisor, sink)), rx)
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        let (session, _rx) = session_with(vec![]);
        let mut events = session.handle_user_turn("   ").await;

        let first = events.next().await.unwrap();
        assert!(matches!(first, OutboundEvent::Error { .. }));
        assert!(events.next().await.is_none());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_forwards_in_emission_order() {
        let (session, mut rx) = session_with(vec!["Hi", " there"]);
        session.dispatch("hello").await;

        let mut received = Vec::new();
        while let Ok((id, event)) = rx.try_recv() {
            assert_eq!(id, "conv-1");
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                OutboundEvent::Chunk { text: "Hi".into() },
                OutboundEvent::Chunk { text: " there".into() },
                OutboundEvent::Complete { text: "Hi there".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_ask_user_roundtrip() {
        let (session, mut rx) = session_with(vec![]);

        let asker = Arc::clone(&session);
        let pending = tokio::spawn(async move {
            asker
                .ask_user("Outline ready. Continue?", vec!["yes".into(), "no".into()])
                .await
        });

        // The prompt reaches the sink and the phase flips
        let (_, prompt) = rx.recv().await.unwrap();
        assert_eq!(
            prompt,
            OutboundEvent::Prompt {
                question: "Outline ready. Continue?".into(),
                options: vec!["yes".into(), "no".into()],
            }
        );
        assert_eq!(session.phase(), ConversationPhase::AwaitingUser);

        // Free-form input resolves the parked decision
        let mut events = session.handle_user_turn("yes").await;
        assert_eq!(
            events.next().await,
            Some(OutboundEvent::Sync { phase: ConversationPhase::Executing })
        );

        assert_eq!(pending.await.unwrap().unwrap(), "yes");
        assert_eq!(session.phase(), ConversationPhase::Executing);
    }

    #[tokio::test]
    async fn test_handle_decision_without_pending_is_error() {
        let (session, _rx) = session_with(vec![]);
        let mut events = session.handle_decision("confirm").await;

        match events.next().await.unwrap() {
            OutboundEvent::Error { message } => {
                assert!(message.contains("no pending decision"), "got: {}", message);
            }
            other => panic!("expected error event, got {:?}", other),
        }
        assert_eq!(session.phase(), ConversationPhase::Idle);
    }
}
