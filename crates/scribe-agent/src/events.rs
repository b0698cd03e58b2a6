//! Outbound event types

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::phase::ConversationPhase;

/// Events emitted toward the client for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// One streamed text fragment
    Chunk { text: String },

    /// Generation ran to completion; carries the full assembled text
    Complete { text: String },

    /// The user interrupted; partial output (if any) was folded into history
    Interrupted,

    /// A generation was cancelled in favor of newer input
    Cancelled,

    /// Terminal failure for this turn
    Error { message: String },

    /// The assistant is waiting on a user decision
    Prompt {
        question: String,
        options: Vec<String>,
    },

    /// Phase acknowledgment (decision resolved, state re-sync)
    Sync { phase: ConversationPhase },
}

impl OutboundEvent {
    /// Check if this event terminates a turn's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutboundEvent::Complete { .. }
                | OutboundEvent::Interrupted
                | OutboundEvent::Cancelled
                | OutboundEvent::Error { .. }
        )
    }

    /// Wrap this event as a single-item stream
    pub fn into_stream(self) -> EventStream {
        Box::pin(tokio_stream::once(self))
    }
}

/// Lazy sequence of events produced by one `handle_user_turn` call
pub type EventStream = Pin<Box<dyn Stream<Item = OutboundEvent> + Send>>;
