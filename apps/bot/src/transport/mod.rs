//! Real-time transport to the room server

mod socketio;

pub use socketio::{decode_frame, encode_event, websocket_url, Frame, SocketIoTransport};

use async_trait::async_trait;

use crate::error::BotResult;
use crate::protocol::OutboundEvent;

/// Outbound half of the room connection
///
/// Inbound events are delivered separately on an mpsc channel so the event
/// loop owns their ordering.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one named event
    async fn emit(&self, event: OutboundEvent) -> BotResult<()>;

    /// Close the connection; a `Disconnected` event follows
    async fn disconnect(&self) -> BotResult<()>;

    /// Rediscover the endpoint and open a fresh connection
    async fn reconnect(&self) -> BotResult<()>;

    /// Send a chat line, logging instead of failing
    async fn say(&self, msg: &str) {
        if let Err(e) = self.emit(OutboundEvent::chat(msg)).await {
            tracing::warn!(error = %e, msg, "Failed to send chat message");
        }
    }
}
