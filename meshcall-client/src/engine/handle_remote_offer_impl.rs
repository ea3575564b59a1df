use crate::engine::NegotiationEngine;
use meshcall_core::{ParticipantId, SessionDescription};
use tracing::{debug, warn};

impl NegotiationEngine {
    pub(super) async fn on_remote_offer(
        &mut self,
        from: ParticipantId,
        description: SessionDescription,
    ) {
        if !self.in_call {
            debug!("Not in a call, ignoring offer from {}", from);
            return;
        }
        if &from == self.local_id() {
            warn!("Ignoring offer from ourselves");
            return;
        }

        // An offer may overtake the participantJoinedCall that announces its
        // sender. The offer itself proves membership.
        self.call_members.entry(from.clone()).or_default();

        if let Err(e) = self.ensure_link(&from).await {
            warn!("Cannot answer {}: {}", from, e);
            return;
        }
        let Some(link) = self.links.get_mut(&from) else {
            return;
        };

        if let Err(e) = link.handle_remote_offer(description, &*self.signals).await {
            warn!("Negotiation round with {} aborted: {}", from, e);
        }
    }

    pub(super) async fn on_remote_answer(
        &mut self,
        from: ParticipantId,
        description: SessionDescription,
    ) {
        let Some(link) = self.links.get_mut(&from) else {
            warn!("Answer from {} without a peer link", from);
            return;
        };

        if let Err(e) = link.handle_remote_answer(description, &*self.signals).await {
            warn!("Negotiation round with {} aborted: {}", from, e);
        }
    }
}
