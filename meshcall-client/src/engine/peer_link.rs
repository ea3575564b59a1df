use crate::engine::SignalSink;
use crate::error::NegotiationError;
use crate::session::{MediaSession, SenderId, SessionId, SignalingState};
use crate::tracks::{LocalTrack, LocalTrackSet};
use meshcall_core::{
    ClientMessage, IceCandidate, ParticipantId, SessionDescription, TrackId, TrackKind, is_polite,
};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No description has been exchanged yet.
    Idle,
    MakingOffer,
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct AttachedSender {
    sender_id: SenderId,
    track_id: TrackId,
}

/// Negotiation state with one remote call member.
pub struct PeerLink {
    remote_id: ParticipantId,
    polite: bool,
    session_id: SessionId,
    session: Box<dyn MediaSession>,
    negotiating: bool,
    /// Another round is due once the current one settles.
    renegotiate: bool,
    ignore_offer: bool,
    remote_description_set: bool,
    pending_candidates: VecDeque<IceCandidate>,
    /// At most one sender per kind.
    senders: HashMap<TrackKind, AttachedSender>,
    offer_sent_at: Option<Instant>,
    established: bool,
}

impl PeerLink {
    pub(crate) fn new(
        local_id: &ParticipantId,
        remote_id: ParticipantId,
        session_id: SessionId,
        session: Box<dyn MediaSession>,
    ) -> Self {
        Self {
            polite: is_polite(local_id, &remote_id),
            remote_id,
            session_id,
            session,
            negotiating: false,
            renegotiate: false,
            ignore_offer: false,
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
            senders: HashMap::new(),
            offer_sent_at: None,
            established: false,
        }
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    pub fn is_polite(&self) -> bool {
        self.polite
    }

    pub fn is_negotiating(&self) -> bool {
        self.negotiating
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.session.signaling_state()
    }

    pub fn state(&self) -> NegotiationState {
        match self.session.signaling_state() {
            SignalingState::Closed => NegotiationState::Closed,
            SignalingState::HaveLocalOffer => NegotiationState::HaveLocalOffer,
            SignalingState::HaveRemoteOffer => NegotiationState::HaveRemoteOffer,
            SignalingState::Stable if self.negotiating => NegotiationState::MakingOffer,
            SignalingState::Stable if !self.remote_description_set => NegotiationState::Idle,
            SignalingState::Stable => NegotiationState::Stable,
        }
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Track currently sent for `kind`.
    pub fn sent_track(&self, kind: TrackKind) -> Option<TrackId> {
        self.senders.get(&kind).map(|s| s.track_id)
    }

    pub fn sender_count(&self) -> usize {
        self.senders.len()
    }

    pub(crate) fn request_renegotiation(&mut self) {
        self.renegotiate = true;
    }

    pub(crate) fn mark_established(&mut self) -> bool {
        !std::mem::replace(&mut self.established, true)
    }

    pub(crate) fn answer_overdue(&self, now: Instant, timeout: Duration) -> bool {
        self.negotiating
            && self
                .offer_sent_at
                .is_some_and(|sent| now.saturating_duration_since(sent) >= timeout)
    }

    /// Start an offer round, or mark one as due if a round is in flight.
    pub(crate) async fn negotiate(
        &mut self,
        signals: &dyn SignalSink,
    ) -> Result<(), NegotiationError> {
        if self.negotiating || self.session.signaling_state() != SignalingState::Stable {
            debug!(
                "Negotiation with {} in flight, another round is due",
                self.remote_id
            );
            self.renegotiate = true;
            return Ok(());
        }

        self.negotiating = true;
        self.renegotiate = false;

        if let Err(e) = self.send_offer(signals).await {
            self.negotiating = false;
            self.offer_sent_at = None;
            return Err(e);
        }
        Ok(())
    }

    async fn send_offer(&mut self, signals: &dyn SignalSink) -> Result<(), NegotiationError> {
        let offer = self
            .session
            .create_offer()
            .await
            .map_err(|source| NegotiationError::session(&self.remote_id, "create offer", source))?;

        self.session
            .set_local_description(offer.clone())
            .await
            .map_err(|source| {
                NegotiationError::session(&self.remote_id, "apply local offer", source)
            })?;

        self.offer_sent_at = Some(Instant::now());
        info!("Sending offer to {}", self.remote_id);
        signals.send(ClientMessage::Offer {
            to_participant_id: self.remote_id.clone(),
            description: offer,
        });
        Ok(())
    }

    /// Answer a remote offer, resolving a collision with our own offer by
    /// politeness: the impolite side ignores the incoming offer, the polite
    /// side rolls its offer back and sends it again once this round settles.
    pub(crate) async fn handle_remote_offer(
        &mut self,
        description: SessionDescription,
        signals: &dyn SignalSink,
    ) -> Result<(), NegotiationError> {
        let collision =
            self.negotiating || self.session.signaling_state() != SignalingState::Stable;
        self.ignore_offer = !self.polite && collision;

        if self.ignore_offer {
            info!(
                "Offer collision with {}, keeping our own offer",
                self.remote_id
            );
            return Ok(());
        }

        if collision {
            info!(
                "Offer collision with {}, rolling back our own offer",
                self.remote_id
            );
            if self.session.signaling_state() == SignalingState::HaveLocalOffer {
                self.session.rollback().await.map_err(|source| {
                    NegotiationError::session(&self.remote_id, "roll back local offer", source)
                })?;
            }
            self.negotiating = false;
            self.offer_sent_at = None;
            self.renegotiate = true;
        }

        self.session
            .set_remote_description(description)
            .await
            .map_err(|source| {
                NegotiationError::session(&self.remote_id, "apply remote offer", source)
            })?;
        let had_remote_description = self.remote_description_set;
        self.remote_description_set = true;
        self.flush_candidates().await;

        if let Err(e) = self.send_answer(signals).await {
            self.abandon_remote_offer(had_remote_description).await;
            return Err(e);
        }

        if self.renegotiate {
            self.negotiate(signals).await?;
        }
        Ok(())
    }

    async fn send_answer(&mut self, signals: &dyn SignalSink) -> Result<(), NegotiationError> {
        let answer = self
            .session
            .create_answer()
            .await
            .map_err(|source| NegotiationError::session(&self.remote_id, "create answer", source))?;
        self.session
            .set_local_description(answer.clone())
            .await
            .map_err(|source| {
                NegotiationError::session(&self.remote_id, "apply local answer", source)
            })?;

        info!("Sending answer to {}", self.remote_id);
        signals.send(ClientMessage::Answer {
            to_participant_id: self.remote_id.clone(),
            description: answer,
        });
        Ok(())
    }

    /// Back out of a remote offer that could not be answered, so the next
    /// local change or remote offer starts from `Stable`.
    async fn abandon_remote_offer(&mut self, had_remote_description: bool) {
        if self.session.signaling_state() == SignalingState::HaveRemoteOffer {
            if let Err(e) = self.session.rollback().await {
                warn!(
                    "Rollback of unanswered offer from {} failed: {}",
                    self.remote_id, e
                );
            }
        }
        self.remote_description_set = had_remote_description;
    }

    pub(crate) async fn handle_remote_answer(
        &mut self,
        description: SessionDescription,
        signals: &dyn SignalSink,
    ) -> Result<(), NegotiationError> {
        if self.session.signaling_state() != SignalingState::HaveLocalOffer {
            debug!(
                "Ignoring answer from {}: no offer outstanding",
                self.remote_id
            );
            return Ok(());
        }

        if let Err(source) = self.session.set_remote_description(description).await {
            self.negotiating = false;
            self.offer_sent_at = None;
            if let Err(e) = self.session.rollback().await {
                debug!("Rollback after failed answer from {}: {}", self.remote_id, e);
            }
            return Err(NegotiationError::session(
                &self.remote_id,
                "apply remote answer",
                source,
            ));
        }

        info!("Negotiation with {} settled", self.remote_id);
        self.negotiating = false;
        self.offer_sent_at = None;
        self.remote_description_set = true;
        self.flush_candidates().await;

        if self.renegotiate {
            self.negotiate(signals).await?;
        }
        Ok(())
    }

    pub(crate) async fn handle_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.remote_description_set {
            debug!(
                "Queueing candidate from {} until its description is applied",
                self.remote_id
            );
            self.pending_candidates.push_back(candidate);
            return;
        }
        self.apply_candidate(candidate).await;
    }

    /// Replay queued candidates in arrival order.
    pub(crate) async fn flush_candidates(&mut self) {
        if !self.pending_candidates.is_empty() {
            debug!(
                "Applying {} queued candidates from {}",
                self.pending_candidates.len(),
                self.remote_id
            );
        }
        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.session.add_ice_candidate(candidate).await {
            if self.ignore_offer {
                debug!(
                    "Candidate from {} belongs to an ignored offer: {}",
                    self.remote_id, e
                );
            } else {
                warn!("Failed to add candidate from {}: {}", self.remote_id, e);
            }
        }
    }

    /// Bring the senders in line with `tracks`. Returns whether the set of
    /// senders changed, which needs a new offer round.
    pub(crate) async fn sync_tracks(&mut self, tracks: &LocalTrackSet) -> bool {
        let mut changed = false;

        for kind in TrackKind::ALL {
            let attached = self.senders.get(&kind).copied();
            match (attached, tracks.active(kind)) {
                (Some(sender), Some(track)) if sender.track_id == track.id => {}
                (Some(sender), Some(track)) => self.replace_sender(kind, sender, track).await,
                (None, Some(track)) => changed |= self.add_sender(kind, track).await,
                (Some(sender), None) => changed |= self.remove_sender(kind, sender).await,
                (None, None) => {}
            }
        }
        changed
    }

    async fn add_sender(&mut self, kind: TrackKind, track: &LocalTrack) -> bool {
        match self.session.add_track(track).await {
            Ok(sender_id) => {
                debug!("Sending {} track {} to {}", kind, track.id, self.remote_id);
                self.senders.insert(
                    kind,
                    AttachedSender {
                        sender_id,
                        track_id: track.id,
                    },
                );
                true
            }
            Err(e) => {
                warn!("Failed to add {} track for {}: {}", kind, self.remote_id, e);
                false
            }
        }
    }

    async fn replace_sender(
        &mut self,
        kind: TrackKind,
        sender: AttachedSender,
        track: &LocalTrack,
    ) {
        match self.session.replace_track(sender.sender_id, track).await {
            Ok(()) => {
                debug!(
                    "Replaced {} track for {}: {} -> {}",
                    kind, self.remote_id, sender.track_id, track.id
                );
                self.senders.insert(
                    kind,
                    AttachedSender {
                        sender_id: sender.sender_id,
                        track_id: track.id,
                    },
                );
            }
            Err(e) => warn!(
                "Failed to replace {} track for {}: {}",
                kind, self.remote_id, e
            ),
        }
    }

    async fn remove_sender(&mut self, kind: TrackKind, sender: AttachedSender) -> bool {
        match self.session.remove_track(sender.sender_id).await {
            Ok(()) => {
                debug!("Stopped sending {} to {}", kind, self.remote_id);
                self.senders.remove(&kind);
                true
            }
            Err(e) => {
                warn!("Failed to remove {} track for {}: {}", kind, self.remote_id, e);
                false
            }
        }
    }

    pub(crate) async fn close(self) {
        if let Err(e) = self.session.close().await {
            debug!("Closing session with {}: {}", self.remote_id, e);
        }
    }
}
