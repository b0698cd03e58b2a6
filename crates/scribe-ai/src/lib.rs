//! scribe-ai: generation-source abstraction for conversational writing agents
//!
//! This crate defines the turn/fragment vocabulary shared across the
//! workspace, the `GenerationSource` contract the supervisor pulls from, and
//! one concrete client for OpenAI-compatible chat-completions endpoints.

pub mod error;
pub mod openai;
pub mod source;
pub mod types;

pub use error::{Error, Result};
pub use openai::ChatCompletionsSource;
pub use source::{FragmentStream, GenerationSource};
pub use types::{Fragment, GenerationParams, Role, Turn};
