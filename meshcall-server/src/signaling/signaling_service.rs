use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::registry::{Binding, ConnectionRegistry};
use crate::room::{RoomCommand, RoomManager, RoomSnapshot};
use crate::signaling::MessageRouter;
use meshcall_core::{ClientMessage, ConnectionId, ParticipantId, RoomId, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct SignalingInner {
    registry: Arc<ConnectionRegistry>,
    router: MessageRouter,
    rooms: RoomManager,
    config: RelayConfig,
}

/// The signaling relay: membership bookkeeping plus blind forwarding of
/// negotiation messages by participant id.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let rooms = RoomManager::new(Arc::new(router.clone()));

        Self {
            inner: Arc::new(SignalingInner {
                registry,
                router,
                rooms,
                config,
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.inner.rooms
    }

    pub async fn room_snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.inner.rooms.snapshot(room_id).await
    }

    /// Accept a new transport connection. The ICE server list is the first
    /// thing it receives.
    pub fn connect(&self, outbound: mpsc::UnboundedSender<ServerMessage>) -> ConnectionId {
        let connection_id = ConnectionId::new();
        self.inner.registry.attach(connection_id, outbound);
        self.inner.router.deliver(
            connection_id,
            ServerMessage::IceConfig {
                ice_servers: self.inner.config.ice_servers.clone(),
            },
        );

        info!("Connection {} attached", connection_id);
        connection_id
    }

    /// Handle one raw text frame. Malformed frames are answered with an
    /// error and never forwarded.
    pub fn handle_text(&self, connection_id: ConnectionId, text: &str) {
        let result = ClientMessage::decode(text)
            .map_err(RelayError::from)
            .and_then(|msg| self.handle_message(connection_id, msg));

        if let Err(e) = result {
            warn!("Rejected message from {}: {}", connection_id, e);
            self.inner.router.deliver(
                connection_id,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            );
        }
    }

    pub fn handle_message(
        &self,
        connection_id: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), RelayError> {
        msg.validate()?;

        match msg {
            ClientMessage::JoinMeeting {
                participant_id,
                display_name,
                room_id,
            } => self.join_room(connection_id, room_id, participant_id, display_name),

            ClientMessage::JoinCall {
                room_id,
                participant_id,
                display_name,
            } => {
                let binding = self.bound_as(connection_id, &room_id, &participant_id)?;
                self.inner.rooms.dispatch(
                    &binding.room_id,
                    RoomCommand::JoinCall {
                        connection_id,
                        participant_id,
                        display_name,
                    },
                );
                Ok(())
            }

            ClientMessage::LeaveCall {
                room_id,
                participant_id,
            } => {
                let binding = self.bound_as(connection_id, &room_id, &participant_id)?;
                self.inner.rooms.dispatch(
                    &binding.room_id,
                    RoomCommand::LeaveCall {
                        connection_id,
                        participant_id,
                    },
                );
                Ok(())
            }

            ClientMessage::Offer {
                to_participant_id,
                description,
            } => {
                let from = self.sender_of(connection_id, &to_participant_id)?;
                self.relay(
                    &to_participant_id,
                    ServerMessage::Offer {
                        from_participant_id: from,
                        description,
                    },
                );
                Ok(())
            }

            ClientMessage::Answer {
                to_participant_id,
                description,
            } => {
                let from = self.sender_of(connection_id, &to_participant_id)?;
                self.relay(
                    &to_participant_id,
                    ServerMessage::Answer {
                        from_participant_id: from,
                        description,
                    },
                );
                Ok(())
            }

            ClientMessage::IceCandidate {
                to_participant_id,
                candidate,
            } => {
                let from = self.sender_of(connection_id, &to_participant_id)?;
                self.relay(
                    &to_participant_id,
                    ServerMessage::IceCandidate {
                        from_participant_id: from,
                        candidate,
                    },
                );
                Ok(())
            }
        }
    }

    /// Transport went away: forget the connection and let its room clean up.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let Some(binding) = self.inner.registry.unregister(&connection_id) else {
            debug!("Connection {} closed before joining a meeting", connection_id);
            return;
        };

        info!(
            "{} ({}) disconnected from meeting {}",
            binding.display_name, binding.participant_id, binding.room_id
        );
        self.inner.rooms.dispatch(
            &binding.room_id,
            RoomCommand::Leave {
                connection_id,
                disconnected: true,
            },
        );
    }

    fn join_room(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        participant_id: ParticipantId,
        display_name: String,
    ) -> Result<(), RelayError> {
        let previous = self.inner.registry.register(
            connection_id,
            participant_id.clone(),
            display_name.clone(),
            room_id.clone(),
        )?;

        // One room per connection: a switch leaves the old room first. The
        // old room sees the connection go as if it had moved away, the
        // new room sees a regular join.
        if let Some(previous) = previous {
            if previous.room_id != room_id || previous.participant_id != participant_id {
                self.inner.rooms.dispatch(
                    &previous.room_id,
                    RoomCommand::Leave {
                        connection_id,
                        disconnected: false,
                    },
                );
            }
        }

        self.inner.rooms.dispatch(
            &room_id,
            RoomCommand::Join {
                connection_id,
                participant_id,
                display_name,
            },
        );
        Ok(())
    }

    fn relay(&self, to: &ParticipantId, msg: ServerMessage) {
        if let Err(e) = self.inner.router.route(to, msg) {
            warn!("Dropping relayed message: {}", e);
        }
    }

    /// Participant a negotiation message is relayed from.
    fn sender_of(
        &self,
        connection_id: ConnectionId,
        to: &ParticipantId,
    ) -> Result<ParticipantId, RelayError> {
        let from = self
            .inner
            .registry
            .binding(&connection_id)
            .map(|b| b.participant_id)
            .ok_or(RelayError::NotRegistered)?;

        if &from == to {
            return Err(RelayError::SelfAddressed(from));
        }
        Ok(from)
    }

    fn bound_as(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> Result<Binding, RelayError> {
        let binding = self
            .inner
            .registry
            .binding(&connection_id)
            .ok_or(RelayError::NotRegistered)?;

        if &binding.room_id != room_id {
            return Err(RelayError::RoomMismatch {
                bound: binding.room_id,
                requested: room_id.clone(),
            });
        }
        if &binding.participant_id != participant_id {
            return Err(RelayError::IdentityMismatch {
                bound: binding.participant_id,
                claimed: participant_id.clone(),
            });
        }
        Ok(binding)
    }
}
