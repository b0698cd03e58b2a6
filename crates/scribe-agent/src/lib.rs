//! scribe-agent: the conversation core
//!
//! This crate provides the interruptible streaming-generation supervisor —
//! one in-flight generation per conversation, race-free cancellation with a
//! bounded drain, and partial-output folding — plus the session facade and
//! registry that wire history, supervisor, and event sink together.

pub mod error;
pub mod events;
pub mod history;
pub mod interrupt;
pub mod phase;
pub mod registry;
pub mod session;
pub mod sink;
pub mod supervisor;

pub use error::{Error, Result};
pub use events::{EventStream, OutboundEvent};
pub use history::History;
pub use interrupt::is_stop_command;
pub use phase::ConversationPhase;
pub use registry::SessionRegistry;
pub use session::Session;
pub use sink::{ChannelSink, EventSink};
pub use supervisor::{Supervisor, SupervisorConfig};
