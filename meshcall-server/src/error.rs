use meshcall_core::{ConnectionId, ParticipantId, ProtocolError, RoomId};
use thiserror::Error;

/// Failures scoped to a single connection or a single message. None of them
/// stop the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection has not joined a meeting")]
    NotRegistered,

    #[error("connection is in room {bound}, not {requested}")]
    RoomMismatch { bound: RoomId, requested: RoomId },

    #[error("connection speaks for {bound}, not {claimed}")]
    IdentityMismatch {
        bound: ParticipantId,
        claimed: ParticipantId,
    },

    #[error("{0} addressed a message to itself")]
    SelfAddressed(ParticipantId),

    #[error("participant {0} is not reachable")]
    RecipientUnreachable(ParticipantId),
}
