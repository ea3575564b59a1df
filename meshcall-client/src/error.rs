use meshcall_core::{ParticipantId, TrackSource};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("not in a call")]
    NotInCall,

    #[error("no peer link to {0}")]
    UnknownPeer(ParticipantId),

    #[error("media session for {participant_id} failed to {operation}: {source}")]
    Session {
        participant_id: ParticipantId,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("expected a {expected:?} track, got {actual:?}")]
    WrongSource {
        expected: TrackSource,
        actual: TrackSource,
    },

    #[error("negotiation engine has stopped")]
    EngineStopped,
}

impl NegotiationError {
    pub(crate) fn session(
        participant_id: &ParticipantId,
        operation: &'static str,
        source: anyhow::Error,
    ) -> Self {
        NegotiationError::Session {
            participant_id: participant_id.clone(),
            operation,
            source,
        }
    }
}
