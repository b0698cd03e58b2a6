//! Conversation phase state

use serde::{Deserialize, Serialize};

/// Where a conversation currently is.
///
/// Mutated only by the supervisor's transition logic. `Completed` and
/// `Interrupted` are not sinks; new input transitions out of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    /// Nothing running, nothing pending
    Idle,
    /// A generation task is in flight
    Executing,
    /// A decision is parked, waiting for the user's reply
    AwaitingUser,
    /// The user stopped a generation; its partial output is folded
    Interrupted,
    /// The last generation ran to its completion marker
    Completed,
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConversationPhase::Idle => "idle",
            ConversationPhase::Executing => "executing",
            ConversationPhase::AwaitingUser => "awaiting_user",
            ConversationPhase::Interrupted => "interrupted",
            ConversationPhase::Completed => "completed",
        })
    }
}
