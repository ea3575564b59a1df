mod handle_remote_offer_impl;
mod handle_signal_impl;
mod peer_link;
mod run_impl;
mod session_event_impl;
mod signal_sink;
mod sync_tracks_impl;

pub use peer_link::{NegotiationState, PeerLink};
pub use signal_sink::SignalSink;

use crate::config::EngineConfig;
use crate::error::NegotiationError;
use crate::session::{SessionEvent, SessionEventSink, SessionFactory, SessionId};
use crate::tracks::LocalTrackSet;
use meshcall_core::{ClientMessage, IceServerConfig, ParticipantId, ServerMessage, TrackKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Why a PeerLink went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLossReason {
    RemoteLeftCall,
    RemoteDisconnected,
    /// The remote joined the call again; its new offer needs a new session.
    RemoteRejoined,
    TransportFailed,
    AnswerTimeout,
    LocalLeave,
    SignalingClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PeerLinkEstablished {
        participant_id: ParticipantId,
    },
    PeerLinkLost {
        participant_id: ParticipantId,
        reason: LinkLossReason,
    },
    RemoteTrack {
        participant_id: ParticipantId,
        kind: TrackKind,
        track_id: String,
    },
}

/// Input of a running engine, see [`NegotiationEngine::run`].
#[derive(Debug)]
pub enum EngineInput {
    JoinMeeting,
    JoinCall,
    LeaveCall,
    Server(ServerMessage),
    TracksChanged(LocalTrackSet),
    SignalingClosed,
}

#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineInput>,
}

impl EngineHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn join_meeting(&self) -> Result<(), NegotiationError> {
        self.send(EngineInput::JoinMeeting)
    }

    pub fn join_call(&self) -> Result<(), NegotiationError> {
        self.send(EngineInput::JoinCall)
    }

    pub fn leave_call(&self) -> Result<(), NegotiationError> {
        self.send(EngineInput::LeaveCall)
    }

    pub fn deliver(&self, msg: ServerMessage) -> Result<(), NegotiationError> {
        self.send(EngineInput::Server(msg))
    }

    pub fn tracks_changed(&self, tracks: LocalTrackSet) -> Result<(), NegotiationError> {
        self.send(EngineInput::TracksChanged(tracks))
    }

    pub fn signaling_closed(&self) -> Result<(), NegotiationError> {
        self.send(EngineInput::SignalingClosed)
    }

    fn send(&self, input: EngineInput) -> Result<(), NegotiationError> {
        self.tx
            .send(input)
            .map_err(|_| NegotiationError::EngineStopped)
    }
}

/// Perfect-negotiation engine of one participant.
///
/// Keeps one [`PeerLink`] per remote call member and drives its offer/answer
/// exchange. Everything runs on a single task: relay messages, session
/// callbacks and local track changes are handled one at a time, so the
/// `negotiating` flag of a link is all the coordination there is.
pub struct NegotiationEngine {
    config: EngineConfig,
    factory: Arc<dyn SessionFactory>,
    signals: Arc<dyn SignalSink>,
    ice_servers: Vec<IceServerConfig>,
    in_call: bool,
    call_members: HashMap<ParticipantId, String>,
    links: HashMap<ParticipantId, PeerLink>,
    tracks: LocalTrackSet,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl NegotiationEngine {
    pub fn new(
        config: EngineConfig,
        factory: Arc<dyn SessionFactory>,
        signals: Arc<dyn SignalSink>,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let engine = Self {
            ice_servers: config.ice_servers.clone(),
            config,
            factory,
            signals,
            in_call: false,
            call_members: HashMap::new(),
            links: HashMap::new(),
            tracks: LocalTrackSet::new(),
            session_tx,
            session_rx,
            events,
        };
        (engine, events_rx)
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.config.participant_id
    }

    pub fn is_in_call(&self) -> bool {
        self.in_call
    }

    pub fn ice_servers(&self) -> &[IceServerConfig] {
        &self.ice_servers
    }

    pub fn link(&self, participant_id: &ParticipantId) -> Option<&PeerLink> {
        self.links.get(participant_id)
    }

    /// Remote ids with a live PeerLink, sorted.
    pub fn linked_participants(&self) -> Vec<ParticipantId> {
        let mut ids = self.links.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Remote call members this engine knows of, sorted.
    pub fn call_members(&self) -> Vec<ParticipantId> {
        let mut ids = self.call_members.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn join_meeting(&self) {
        info!(
            "Joining meeting {} as {}",
            self.config.room_id, self.config.participant_id
        );
        self.signals.send(ClientMessage::JoinMeeting {
            participant_id: self.config.participant_id.clone(),
            display_name: self.config.display_name.clone(),
            room_id: self.config.room_id.clone(),
        });
    }

    /// Enter the call. The relay answers with the current members, and this
    /// side then offers to each of them.
    pub fn join_call(&mut self) {
        if self.in_call {
            debug!("Already in the call of {}", self.config.room_id);
            return;
        }

        self.in_call = true;
        self.signals.send(ClientMessage::JoinCall {
            room_id: self.config.room_id.clone(),
            participant_id: self.config.participant_id.clone(),
            display_name: self.config.display_name.clone(),
        });
    }

    /// Close every PeerLink and tell the relay we left.
    pub async fn leave_call(&mut self) -> Result<(), NegotiationError> {
        if !self.in_call {
            return Err(NegotiationError::NotInCall);
        }

        info!("Leaving the call of {}", self.config.room_id);
        self.in_call = false;
        self.signals.send(ClientMessage::LeaveCall {
            room_id: self.config.room_id.clone(),
            participant_id: self.config.participant_id.clone(),
        });
        self.drop_all_links(LinkLossReason::LocalLeave).await;
        Ok(())
    }

    /// The signaling transport is gone. Nothing negotiated over it can
    /// complete, so every link is released.
    pub async fn signaling_closed(&mut self) {
        warn!("Signaling connection closed, releasing all peer links");
        self.in_call = false;
        self.drop_all_links(LinkLossReason::SignalingClosed).await;
    }

    async fn drop_all_links(&mut self, reason: LinkLossReason) {
        let ids = self.links.keys().cloned().collect::<Vec<_>>();
        for id in ids {
            self.drop_link(&id, reason).await;
        }
        self.call_members.clear();
    }

    /// Create the PeerLink to `remote` unless it exists. A new link starts
    /// out with the current local tracks attached.
    async fn ensure_link(&mut self, remote: &ParticipantId) -> Result<(), NegotiationError> {
        if self.links.contains_key(remote) {
            return Ok(());
        }

        let session_id = SessionId::new();
        let sink = SessionEventSink::new(remote.clone(), session_id, self.session_tx.clone());
        let session = self
            .factory
            .create(sink, &self.ice_servers)
            .await
            .map_err(|source| NegotiationError::session(remote, "open", source))?;

        let mut link = PeerLink::new(self.local_id(), remote.clone(), session_id, session);
        info!(
            "Opened peer link to {} (polite: {})",
            remote,
            link.is_polite()
        );

        if link.sync_tracks(&self.tracks).await {
            link.request_renegotiation();
        }
        self.links.insert(remote.clone(), link);
        Ok(())
    }

    async fn drop_link(&mut self, remote: &ParticipantId, reason: LinkLossReason) {
        let Some(link) = self.links.remove(remote) else {
            debug!("No peer link to {} to drop", remote);
            return;
        };

        info!("Closing peer link to {} ({:?})", remote, reason);
        link.close().await;
        self.emit(EngineEvent::PeerLinkLost {
            participant_id: remote.clone(),
            reason,
        });
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("Nobody listens to engine events");
        }
    }
}
