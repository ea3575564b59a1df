mod rtc_session;

pub use rtc_session::{RtcSession, RtcSessionFactory};

use crate::tracks::LocalTrack;
use async_trait::async_trait;
use meshcall_core::{
    IceCandidate, IceServerConfig, ParticipantId, SessionDescription, TrackId, TrackKind,
};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identity of one media session. A PeerLink that is torn down and rebuilt
/// gets a new session id, so late events of the old session can be told apart.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of one outgoing track slot inside a session.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct SenderId(pub Uuid);

impl SenderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SenderId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventKind {
    LocalCandidate(IceCandidate),
    TransportStateChanged(TransportState),
    RemoteTrack { kind: TrackKind, track_id: String },
}

/// Something a media session reported on its own, outside of a method call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub participant_id: ParticipantId,
    pub session_id: SessionId,
    pub kind: SessionEventKind,
}

/// Where a session pushes its callbacks. All sessions of one engine share the
/// same queue, which the engine drains in order.
#[derive(Debug, Clone)]
pub struct SessionEventSink {
    participant_id: ParticipantId,
    session_id: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEventSink {
    pub fn new(
        participant_id: ParticipantId,
        session_id: SessionId,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            participant_id,
            session_id,
            tx,
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn emit(&self, kind: SessionEventKind) {
        let event = SessionEvent {
            participant_id: self.participant_id.clone(),
            session_id: self.session_id,
            kind,
        };
        if self.tx.send(event).is_err() {
            debug!(
                "Engine is gone, dropping event of session {}",
                self.session_id
            );
        }
    }
}

/// One media session with one remote participant.
///
/// Mirrors the subset of a peer connection the negotiation engine drives.
/// Implementations report candidates, transport state and remote tracks
/// through the [`SessionEventSink`] they were created with.
#[async_trait]
pub trait MediaSession: Send + Sync {
    fn signaling_state(&self) -> SignalingState;

    async fn create_offer(&self) -> anyhow::Result<SessionDescription>;

    async fn create_answer(&self) -> anyhow::Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> anyhow::Result<()>;

    async fn set_remote_description(&self, description: SessionDescription)
    -> anyhow::Result<()>;

    /// Discard the pending local or remote offer and return to `Stable`.
    async fn rollback(&self) -> anyhow::Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()>;

    async fn add_track(&self, track: &LocalTrack) -> anyhow::Result<SenderId>;

    /// Swap the track behind an existing sender. Needs no renegotiation.
    async fn replace_track(&self, sender: SenderId, track: &LocalTrack) -> anyhow::Result<()>;

    async fn remove_track(&self, sender: SenderId) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(
        &self,
        events: SessionEventSink,
        ice_servers: &[IceServerConfig],
    ) -> anyhow::Result<Box<dyn MediaSession>>;

    /// `track_id` is no longer captured and no session sends it any more.
    fn release_track(&self, track_id: TrackId);
}
