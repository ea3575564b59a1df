use crate::room::room::RoomDirectory;
use crate::room::{Room, RoomCommand, RoomSnapshot};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use meshcall_core::RoomId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// Spawns room actors on demand and routes commands to them.
///
/// A room exists while at least one connection is present in it. The actor
/// removes its own directory entry once it is empty, and the next command for
/// that room id starts a fresh actor.
#[derive(Clone)]
pub struct RoomManager {
    rooms: RoomDirectory,
    signaling: Arc<dyn SignalingOutput>,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
        }
    }

    /// Hand `cmd` to the actor of `room_id`, starting one if needed.
    ///
    /// The send happens under the directory entry so it cannot interleave
    /// with the actor retiring itself.
    pub fn dispatch(&self, room_id: &RoomId, cmd: RoomCommand) {
        let entry = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_room(room_id));

        if let Err(e) = entry.send(cmd) {
            error!("Room {} is gone, dropping {:?}", room_id, e.0);
        }
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        if !self.rooms.contains_key(room_id) {
            return None;
        }

        let (reply, rx) = oneshot::channel();
        self.dispatch(room_id, RoomCommand::Snapshot { reply });
        rx.await.ok()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    fn spawn_room(&self, room_id: &RoomId) -> mpsc::UnboundedSender<RoomCommand> {
        info!("Creating new room: {}", room_id);
        let (tx, rx) = mpsc::unbounded_channel();

        let room = Room::new(
            room_id.clone(),
            tx.clone(),
            rx,
            self.rooms.clone(),
            self.signaling.clone(),
        );
        tokio::spawn(room.run());

        tx
    }
}
