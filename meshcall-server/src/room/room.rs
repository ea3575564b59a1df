use crate::room::room_command::{RoomCommand, RoomSnapshot};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use meshcall_core::{CallMember, ConnectionId, ParticipantId, RoomId, ServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) type RoomDirectory = Arc<DashMap<RoomId, mpsc::UnboundedSender<RoomCommand>>>;

struct Presence {
    participant_id: ParticipantId,
    display_name: String,
}

/// Room actor.
///
/// Owns presence and call membership of one room. Commands are handled one at
/// a time and every broadcast a command causes is queued before the next
/// command is looked at, so no snapshot ever shows a participant whose
/// departure has already been announced.
pub struct Room {
    room_id: RoomId,
    presence: HashMap<ConnectionId, Presence>,
    /// In join order.
    call: Vec<CallMember>,
    command_rx: mpsc::UnboundedReceiver<RoomCommand>,
    command_tx: mpsc::UnboundedSender<RoomCommand>,
    directory: RoomDirectory,
    signaling: Arc<dyn SignalingOutput>,
}

impl Room {
    pub(crate) fn new(
        room_id: RoomId,
        command_tx: mpsc::UnboundedSender<RoomCommand>,
        command_rx: mpsc::UnboundedReceiver<RoomCommand>,
        directory: RoomDirectory,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            room_id,
            presence: HashMap::new(),
            call: Vec::new(),
            command_rx,
            command_tx,
            directory,
            signaling,
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;

            if self.presence.is_empty() && self.try_retire() {
                break;
            }
        }

        info!("Room {} is empty, event loop finished", self.room_id);
    }

    /// Drop this room from the directory if nothing is waiting in its queue.
    /// Dispatch sends while holding the directory entry, so once the entry is
    /// gone no further command can reach this actor.
    fn try_retire(&self) -> bool {
        let command_tx = &self.command_tx;
        let command_rx = &self.command_rx;
        self.directory
            .remove_if(&self.room_id, |_, tx| {
                tx.same_channel(command_tx) && command_rx.is_empty()
            })
            .is_some()
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                connection_id,
                participant_id,
                display_name,
            } => {
                info!(
                    "{} ({}) joined room {}",
                    display_name, participant_id, self.room_id
                );
                self.presence.insert(
                    connection_id,
                    Presence {
                        participant_id,
                        display_name,
                    },
                );
            }

            RoomCommand::JoinCall {
                connection_id,
                participant_id,
                display_name,
            } => {
                self.join_call(connection_id, participant_id, display_name)
                    .await;
            }

            RoomCommand::LeaveCall {
                connection_id,
                participant_id,
            } => {
                if !self.speaks_for(&connection_id, &participant_id) {
                    self.reject(connection_id, &participant_id).await;
                    return;
                }
                self.leave_call(&participant_id, Some(connection_id)).await;
            }

            RoomCommand::Leave {
                connection_id,
                disconnected,
            } => {
                self.leave(connection_id, disconnected).await;
            }

            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn join_call(
        &mut self,
        connection_id: ConnectionId,
        participant_id: ParticipantId,
        display_name: String,
    ) {
        if !self.speaks_for(&connection_id, &participant_id) {
            self.reject(connection_id, &participant_id).await;
            return;
        }

        match self
            .call
            .iter_mut()
            .find(|m| m.participant_id == participant_id)
        {
            Some(member) => member.display_name = display_name.clone(),
            None => self.call.push(CallMember {
                participant_id: participant_id.clone(),
                display_name: display_name.clone(),
            }),
        }

        // Room observers learn about the newcomer before the newcomer can
        // act on its snapshot and start sending offers.
        self.broadcast_except(
            connection_id,
            ServerMessage::ParticipantJoinedCall {
                participant_id: participant_id.clone(),
                display_name: display_name.clone(),
            },
        )
        .await;

        let users = self
            .call
            .iter()
            .filter(|m| m.participant_id != participant_id)
            .cloned()
            .collect::<Vec<_>>();

        info!(
            "{} ({}) joined the call in room {} ({} in call)",
            display_name,
            participant_id,
            self.room_id,
            self.call.len()
        );

        self.signaling
            .send_to(connection_id, ServerMessage::UsersInCall { users })
            .await;
    }

    /// Remove `participant_id` from the call and tell everyone else in the
    /// room. `origin` is excluded from the broadcast.
    async fn leave_call(
        &mut self,
        participant_id: &ParticipantId,
        origin: Option<ConnectionId>,
    ) -> bool {
        let before = self.call.len();
        self.call.retain(|m| &m.participant_id != participant_id);
        if self.call.len() == before {
            debug!(
                "{} is not in the call of room {}, nothing to leave",
                participant_id, self.room_id
            );
            return false;
        }

        info!(
            "{} left the call in room {} ({} in call)",
            participant_id,
            self.room_id,
            self.call.len()
        );

        let msg = ServerMessage::ParticipantLeftCall {
            participant_id: participant_id.clone(),
        };
        match origin {
            Some(origin) => self.broadcast_except(origin, msg).await,
            None => self.broadcast(msg).await,
        }
        true
    }

    async fn leave(&mut self, connection_id: ConnectionId, disconnected: bool) {
        let Some(presence) = self.presence.remove(&connection_id) else {
            warn!(
                "Connection {} is not present in room {}",
                connection_id, self.room_id
            );
            return;
        };

        let still_present = self
            .presence
            .values()
            .any(|p| p.participant_id == presence.participant_id);
        if still_present {
            debug!(
                "{} still has another connection in room {}",
                presence.participant_id, self.room_id
            );
            return;
        }

        self.leave_call(&presence.participant_id, None).await;

        if disconnected {
            info!(
                "{} ({}) disconnected from room {}",
                presence.display_name, presence.participant_id, self.room_id
            );
            self.broadcast(ServerMessage::ParticipantDisconnected {
                participant_id: presence.participant_id,
            })
            .await;
        }
    }

    fn speaks_for(&self, connection_id: &ConnectionId, participant_id: &ParticipantId) -> bool {
        self.presence
            .get(connection_id)
            .is_some_and(|p| &p.participant_id == participant_id)
    }

    async fn reject(&self, connection_id: ConnectionId, participant_id: &ParticipantId) {
        warn!(
            "Connection {} is not present in room {} as {}",
            connection_id, self.room_id, participant_id
        );
        self.signaling
            .send_to(
                connection_id,
                ServerMessage::Error {
                    message: format!("not present in room {}", self.room_id),
                },
            )
            .await;
    }

    async fn broadcast(&self, msg: ServerMessage) {
        for connection_id in self.presence.keys() {
            self.signaling.send_to(*connection_id, msg.clone()).await;
        }
    }

    async fn broadcast_except(&self, except: ConnectionId, msg: ServerMessage) {
        for connection_id in self.presence.keys().filter(|c| **c != except) {
            self.signaling.send_to(*connection_id, msg.clone()).await;
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        let mut present = self
            .presence
            .values()
            .map(|p| p.participant_id.clone())
            .collect::<Vec<_>>();
        present.sort();
        present.dedup();

        RoomSnapshot {
            present,
            in_call: self.call.clone(),
        }
    }
}
