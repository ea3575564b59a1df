use crate::error::RelayError;
use crate::registry::ConnectionRegistry;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use meshcall_core::{ConnectionId, ParticipantId, ServerMessage};
use std::sync::Arc;
use tracing::{debug, error};

/// Forwards messages to live connections, by handle or by participant.
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `msg` to the current connection of `participant_id`.
    ///
    /// A miss means the recipient is unreachable right now. The caller
    /// decides whether that matters; for relayed negotiation traffic it
    /// does not.
    pub fn route(
        &self,
        participant_id: &ParticipantId,
        msg: ServerMessage,
    ) -> Result<(), RelayError> {
        let connection_id = self
            .registry
            .lookup(participant_id)
            .ok_or_else(|| RelayError::RecipientUnreachable(participant_id.clone()))?;

        if self.deliver(connection_id, msg) {
            Ok(())
        } else {
            Err(RelayError::RecipientUnreachable(participant_id.clone()))
        }
    }

    pub fn deliver(&self, connection_id: ConnectionId, msg: ServerMessage) -> bool {
        let Some(outbound) = self.registry.outbound(&connection_id) else {
            debug!("Dropping message for closed connection {}", connection_id);
            return false;
        };

        if let Err(e) = outbound.send(msg) {
            error!("Failed to queue message for {}: {:?}", connection_id, e.0);
            return false;
        }
        true
    }
}

#[async_trait]
impl SignalingOutput for MessageRouter {
    async fn send_to(&self, connection_id: ConnectionId, msg: ServerMessage) {
        self.deliver(connection_id, msg);
    }
}
