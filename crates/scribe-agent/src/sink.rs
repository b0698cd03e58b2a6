//! Event-sink contract

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::OutboundEvent;

/// Send-only event destination, one per transport connection.
///
/// Delivery is at-most-once and fire-and-forget; within one sink the
/// delivery order matches emission order.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, conversation_id: &str, event: &OutboundEvent);
}

/// Sink backed by an unbounded channel; the receiving half is the transport.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(String, OutboundEvent)>,
}

impl ChannelSink {
    /// Create a sink and its receiving half
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, OutboundEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, conversation_id: &str, event: &OutboundEvent) {
        // A closed receiver means the client went away; nothing to do.
        let _ = self.tx.send((conversation_id.to_string(), event.clone()));
    }
}
