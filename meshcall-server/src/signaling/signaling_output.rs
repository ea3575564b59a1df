use async_trait::async_trait;
use meshcall_core::{ConnectionId, ServerMessage};

/// Outbound side of the relay, as seen by the room actors.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queue a message for one connection. Delivery to a connection that has
    /// already gone away is dropped silently.
    async fn send_to(&self, connection_id: ConnectionId, msg: ServerMessage);
}
