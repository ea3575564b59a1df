use meshcall_core::{CallMember, ConnectionId, ParticipantId};
use tokio::sync::oneshot;

/// Commands delivered to a room actor by the relay.
#[derive(Debug)]
pub enum RoomCommand {
    /// A connection entered the room (`joinMeeting`).
    Join {
        connection_id: ConnectionId,
        participant_id: ParticipantId,
        display_name: String,
    },

    /// The participant behind `connection_id` opted into the media call.
    JoinCall {
        connection_id: ConnectionId,
        participant_id: ParticipantId,
        display_name: String,
    },

    LeaveCall {
        connection_id: ConnectionId,
        participant_id: ParticipantId,
    },

    /// The connection left the room, either because its transport went away
    /// (`disconnected`) or because it moved to another room.
    Leave {
        connection_id: ConnectionId,
        disconnected: bool,
    },

    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

/// Point-in-time view of a room, for inspection and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub present: Vec<ParticipantId>,
    pub in_call: Vec<CallMember>,
}
