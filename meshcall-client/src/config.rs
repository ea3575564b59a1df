use meshcall_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use meshcall_core::{IceServerConfig, ParticipantId, RoomId};
use std::time::Duration;

/// Default time an outstanding offer may wait for its answer.
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub room_id: RoomId,
    /// Used until the relay pushes its own list.
    pub ice_servers: Vec<IceServerConfig>,
    pub answer_timeout: Duration,
    /// How often [`crate::NegotiationEngine::run`] looks for overdue answers.
    pub timeout_check_interval: Duration,
}

impl EngineConfig {
    pub fn new(
        participant_id: impl Into<ParticipantId>,
        display_name: impl Into<String>,
        room_id: impl Into<RoomId>,
    ) -> Self {
        Self {
            participant_id: participant_id.into(),
            display_name: display_name.into(),
            room_id: room_id.into(),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_string(), DEFAULT_STUN_ADDR_2.to_string()],
                username: None,
                credential: None,
            }],
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            timeout_check_interval: Duration::from_secs(1),
        }
    }

    pub fn with_answer_timeout(mut self, answer_timeout: Duration) -> Self {
        self.answer_timeout = answer_timeout;
        self
    }
}
