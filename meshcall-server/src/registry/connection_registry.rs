use crate::error::RelayError;
use dashmap::DashMap;
use meshcall_core::{ConnectionId, ParticipantId, RoomId, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Who a connection speaks for, set by `joinMeeting`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub room_id: RoomId,
}

struct ConnectionEntry {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    binding: Option<Binding>,
}

/// Live connections and the participant each one is bound to.
///
/// Room presence and call membership are owned by the room actors; this
/// registry only answers "which connection reaches participant X" and
/// "who is behind connection C".
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    participants: DashMap<ParticipantId, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted transport connection.
    pub fn attach(
        &self,
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.connections.insert(
            connection_id,
            ConnectionEntry {
                outbound,
                binding: None,
            },
        );
    }

    /// Bind a connection to a participant and room.
    ///
    /// The participant mapping is overwritten unconditionally, so a client
    /// that reconnects without a clean disconnect is reachable on its new
    /// connection at once. Returns the binding the connection had before.
    pub fn register(
        &self,
        connection_id: ConnectionId,
        participant_id: ParticipantId,
        display_name: String,
        room_id: RoomId,
    ) -> Result<Option<Binding>, RelayError> {
        let mut entry = self
            .connections
            .get_mut(&connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;

        let previous = entry.binding.replace(Binding {
            participant_id: participant_id.clone(),
            display_name,
            room_id,
        });
        drop(entry);

        if let Some(old) = &previous {
            if old.participant_id != participant_id {
                self.forget_participant(&old.participant_id, connection_id);
            }
        }

        if let Some(stale) = self.participants.insert(participant_id.clone(), connection_id) {
            if stale != connection_id {
                debug!(
                    "Participant {} moved from connection {} to {}",
                    participant_id, stale, connection_id
                );
            }
        }

        Ok(previous)
    }

    pub fn lookup(&self, participant_id: &ParticipantId) -> Option<ConnectionId> {
        self.participants.get(participant_id).map(|c| *c)
    }

    pub fn binding(&self, connection_id: &ConnectionId) -> Option<Binding> {
        self.connections
            .get(connection_id)
            .and_then(|entry| entry.binding.clone())
    }

    pub fn outbound(
        &self,
        connection_id: &ConnectionId,
    ) -> Option<mpsc::UnboundedSender<ServerMessage>> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.outbound.clone())
    }

    /// Forget a connection entirely. Returns its binding, if it had one.
    /// Unknown handles are a logged no-op.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<Binding> {
        let Some((_, entry)) = self.connections.remove(connection_id) else {
            warn!("Unregister for unknown connection {}", connection_id);
            return None;
        };

        let binding = entry.binding?;
        self.forget_participant(&binding.participant_id, *connection_id);
        Some(binding)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    // A newer connection may already own the mapping; leave it alone then.
    fn forget_participant(&self, participant_id: &ParticipantId, connection_id: ConnectionId) {
        self.participants
            .remove_if(participant_id, |_, current| *current == connection_id);
    }
}
