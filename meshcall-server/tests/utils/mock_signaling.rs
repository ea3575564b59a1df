use async_trait::async_trait;
use meshcall_core::{ConnectionId, ServerMessage};
use meshcall_server::SignalingOutput;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// A message captured on its way to a connection.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub connection_id: ConnectionId,
    pub msg: ServerMessage,
}

/// Mock SignalingOutput that captures everything the rooms send.
#[derive(Clone)]
pub struct MockSignalingOutput {
    /// Channel to send captured messages.
    tx: mpsc::UnboundedSender<Delivered>,
    /// All captured messages (for verification).
    delivered: Arc<Mutex<Vec<Delivered>>>,
}

impl MockSignalingOutput {
    /// Create a new MockSignalingOutput and its receiver channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivered>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            delivered: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    /// All messages delivered to one connection, in order.
    pub async fn messages_for(&self, connection_id: &ConnectionId) -> Vec<ServerMessage> {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|d| &d.connection_id == connection_id)
            .map(|d| d.msg.clone())
            .collect()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_to(&self, connection_id: ConnectionId, msg: ServerMessage) {
        tracing::debug!("[MockSignaling] send_to {}: {:?}", connection_id, msg);

        let delivered = Delivered { connection_id, msg };
        self.delivered.lock().await.push(delivered.clone());
        let _ = self.tx.send(delivered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signaling_captures_messages() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let conn = ConnectionId::new();
        let msg = ServerMessage::ParticipantLeftCall {
            participant_id: "1".into(),
        };

        signaling.send_to(conn, msg.clone()).await;

        let captured = rx.recv().await.unwrap();
        assert_eq!(captured.connection_id, conn);
        assert_eq!(signaling.messages_for(&conn).await, vec![msg]);
    }
}
