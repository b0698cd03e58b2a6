//! Error types for scribe-agent

use thiserror::Error;

/// Result type alias using scribe-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during conversation operations.
///
/// Generation-source and persistence failures never surface here; the
/// supervisor converts the former into `error` events and degrades the
/// latter to memory-only operation.
#[derive(Error, Debug)]
pub enum Error {
    /// A decision is already parked for this conversation
    #[error("a decision is already pending")]
    DecisionPending,

    /// The parked decision was dropped before a reply arrived
    #[error("decision was abandoned before a reply arrived")]
    DecisionDropped,
}
