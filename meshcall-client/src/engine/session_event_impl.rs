use crate::engine::{EngineEvent, LinkLossReason, NegotiationEngine};
use crate::session::{SessionEvent, SessionEventKind, TransportState};
use meshcall_core::ClientMessage;
use tracing::{debug, info, warn};

impl NegotiationEngine {
    /// Apply everything the media sessions reported so far. Returns the
    /// number of events handled.
    pub async fn process_session_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.session_rx.try_recv() {
            self.handle_session_event(event).await;
            handled += 1;
        }
        handled
    }

    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        let SessionEvent {
            participant_id,
            session_id,
            kind,
        } = event;

        let Some(link) = self.links.get_mut(&participant_id) else {
            debug!("Event for closed link to {}: {:?}", participant_id, kind);
            return;
        };
        if link.session_id() != session_id {
            debug!("Event of a replaced session with {}", participant_id);
            return;
        }

        match kind {
            SessionEventKind::LocalCandidate(candidate) => {
                self.signals.send(ClientMessage::IceCandidate {
                    to_participant_id: participant_id,
                    candidate,
                });
            }

            SessionEventKind::TransportStateChanged(TransportState::Connected) => {
                if link.mark_established() {
                    info!("Peer link to {} established", participant_id);
                    self.emit(EngineEvent::PeerLinkEstablished { participant_id });
                }
            }

            SessionEventKind::TransportStateChanged(
                state @ (TransportState::Failed
                | TransportState::Disconnected
                | TransportState::Closed),
            ) => {
                warn!("Transport to {} is {:?}", participant_id, state);
                self.drop_link(&participant_id, LinkLossReason::TransportFailed)
                    .await;
            }

            SessionEventKind::TransportStateChanged(state) => {
                debug!("Transport to {} is {:?}", participant_id, state);
            }

            SessionEventKind::RemoteTrack { kind, track_id } => {
                info!("Receiving {} track {} from {}", kind, track_id, participant_id);
                self.emit(EngineEvent::RemoteTrack {
                    participant_id,
                    kind,
                    track_id,
                });
            }
        }
    }
}
