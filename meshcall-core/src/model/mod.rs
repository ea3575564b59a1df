mod connection;
mod participant;
mod room;
mod signaling;
mod track;

pub use connection::ConnectionId;
pub use participant::{ParticipantId, is_polite};
pub use room::RoomId;
pub use signaling::{
    CallMember, ClientMessage, IceCandidate, IceServerConfig, SdpType, ServerMessage,
    SessionDescription,
};
pub use track::{TrackId, TrackKind, TrackSource};
