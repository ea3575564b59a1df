pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod tracks;

pub use config::EngineConfig;
pub use engine::{
    EngineEvent, EngineHandle, EngineInput, LinkLossReason, NegotiationEngine, NegotiationState,
    PeerLink, SignalSink,
};
pub use error::NegotiationError;
pub use session::{
    MediaSession, RtcSession, RtcSessionFactory, SenderId, SessionEvent, SessionEventKind,
    SessionEventSink, SessionFactory, SessionId, SignalingState, TransportState,
};
pub use tracks::{LocalTrack, LocalTrackSet, TrackManager};
