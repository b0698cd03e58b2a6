//! Generation-source contract

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    types::{Fragment, GenerationParams, Turn},
};

/// A lazy sequence of fragments terminated by `Fragment::Completion`.
///
/// An `Err` item, or a stream that ends without yielding `Completion`, is an
/// abnormal termination. Dropping the stream at any point must be safe.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// Something that turns an ordered prompt into a stream of fragments
#[async_trait]
pub trait GenerationSource: Send + Sync {
    /// Start a generation over the given turns, streaming fragments back.
    ///
    /// `cancel` is a cooperative stop signal: once triggered the source
    /// should stop yielding at the next opportunity, without erroring.
    async fn generate(
        &self,
        turns: Vec<Turn>,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<FragmentStream>;
}
