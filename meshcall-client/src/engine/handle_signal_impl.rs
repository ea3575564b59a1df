use crate::engine::{LinkLossReason, NegotiationEngine};
use meshcall_core::{CallMember, IceCandidate, ParticipantId, ServerMessage};
use tracing::{debug, info, warn};

impl NegotiationEngine {
    /// Apply one message from the relay.
    pub async fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::IceConfig { ice_servers } => {
                debug!("Relay advertised {} ICE servers", ice_servers.len());
                self.ice_servers = ice_servers;
            }

            ServerMessage::UsersInCall { users } => self.on_users_in_call(users).await,

            ServerMessage::ParticipantJoinedCall {
                participant_id,
                display_name,
            } => {
                if &participant_id == self.local_id() {
                    return;
                }
                // The newcomer offers; this side only waits for it.
                info!("{} ({}) joined the call", display_name, participant_id);
                if self.links.contains_key(&participant_id) {
                    self.drop_link(&participant_id, LinkLossReason::RemoteRejoined)
                        .await;
                }
                self.call_members.insert(participant_id, display_name);
            }

            ServerMessage::ParticipantLeftCall { participant_id } => {
                info!("{} left the call", participant_id);
                self.call_members.remove(&participant_id);
                self.drop_link(&participant_id, LinkLossReason::RemoteLeftCall)
                    .await;
            }

            ServerMessage::ParticipantDisconnected { participant_id } => {
                info!("{} disconnected", participant_id);
                self.call_members.remove(&participant_id);
                self.drop_link(&participant_id, LinkLossReason::RemoteDisconnected)
                    .await;
            }

            ServerMessage::Offer {
                from_participant_id,
                description,
            } => self.on_remote_offer(from_participant_id, description).await,

            ServerMessage::Answer {
                from_participant_id,
                description,
            } => self.on_remote_answer(from_participant_id, description).await,

            ServerMessage::IceCandidate {
                from_participant_id,
                candidate,
            } => self.on_remote_candidate(from_participant_id, candidate).await,

            ServerMessage::Error { message } => {
                warn!("Relay rejected a message: {}", message);
            }
        }
    }

    /// The call snapshot taken when we joined: offer to everyone in it.
    async fn on_users_in_call(&mut self, users: Vec<CallMember>) {
        if !self.in_call {
            debug!("Not in a call, ignoring call snapshot");
            return;
        }

        info!("{} participants already in the call", users.len());
        for member in users {
            let remote = member.participant_id;
            if &remote == self.local_id() {
                continue;
            }
            self.call_members.insert(remote.clone(), member.display_name);

            if let Err(e) = self.ensure_link(&remote).await {
                warn!("Cannot connect to {}: {}", remote, e);
                continue;
            }
            let Some(link) = self.links.get_mut(&remote) else {
                continue;
            };
            if let Err(e) = link.negotiate(&*self.signals).await {
                warn!("Negotiation round with {} aborted: {}", remote, e);
            }
        }
    }

    async fn on_remote_candidate(&mut self, from: ParticipantId, candidate: IceCandidate) {
        if !self.links.contains_key(&from) {
            if !self.in_call || !self.call_members.contains_key(&from) {
                debug!("Dropping candidate from {}: not a call member", from);
                return;
            }
            // Candidates can only be applied once the offer shows up.
            if let Err(e) = self.ensure_link(&from).await {
                warn!("Cannot take candidate from {}: {}", from, e);
                return;
            }
        }

        if let Some(link) = self.links.get_mut(&from) {
            link.handle_remote_candidate(candidate).await;
        }
    }
}
