use crate::error::ProtocolError;
use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
        }
    }
}

/// Session description as exchanged between peers. The relay forwards it
/// without looking inside `sdp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    fn require_type(&self, expected: SdpType) -> Result<(), ProtocolError> {
        if self.sdp_type != expected {
            return Err(ProtocolError::UnexpectedSdpType {
                expected: expected.as_str(),
                actual: self.sdp_type.as_str(),
            });
        }
        if self.sdp.trim().is_empty() {
            return Err(ProtocolError::EmptyField("sdp"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallMember {
    pub participant_id: ParticipantId,
    pub display_name: String,
}

/// Messages a client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinMeeting {
        participant_id: ParticipantId,
        display_name: String,
        room_id: RoomId,
    },
    JoinCall {
        room_id: RoomId,
        participant_id: ParticipantId,
        display_name: String,
    },
    LeaveCall {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    Offer {
        to_participant_id: ParticipantId,
        description: SessionDescription,
    },
    Answer {
        to_participant_id: ParticipantId,
        description: SessionDescription,
    },
    IceCandidate {
        to_participant_id: ParticipantId,
        candidate: IceCandidate,
    },
}

impl ClientMessage {
    /// Parse and validate a text frame. Anything returned as `Ok` is safe to
    /// act on or forward.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg: ClientMessage = serde_json::from_str(text)?;
        msg.validate()?;
        Ok(msg)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::JoinMeeting {
                participant_id,
                room_id,
                ..
            }
            | ClientMessage::JoinCall {
                participant_id,
                room_id,
                ..
            }
            | ClientMessage::LeaveCall {
                participant_id,
                room_id,
            } => {
                if participant_id.is_empty() {
                    return Err(ProtocolError::EmptyField("participant_id"));
                }
                if room_id.is_empty() {
                    return Err(ProtocolError::EmptyField("room_id"));
                }
                Ok(())
            }
            ClientMessage::Offer {
                to_participant_id,
                description,
            } => {
                require_recipient(to_participant_id)?;
                description.require_type(SdpType::Offer)
            }
            ClientMessage::Answer {
                to_participant_id,
                description,
            } => {
                require_recipient(to_participant_id)?;
                description.require_type(SdpType::Answer)
            }
            ClientMessage::IceCandidate {
                to_participant_id,
                candidate,
            } => {
                require_recipient(to_participant_id)?;
                if candidate.candidate.trim().is_empty() {
                    return Err(ProtocolError::EmptyField("candidate"));
                }
                Ok(())
            }
        }
    }
}

fn require_recipient(to: &ParticipantId) -> Result<(), ProtocolError> {
    if to.is_empty() {
        return Err(ProtocolError::EmptyField("to_participant_id"));
    }
    Ok(())
}

/// Messages the relay sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "camelCase")]
pub enum ServerMessage {
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    /// Call members already present, sent only to the joiner. Never contains
    /// the joiner itself.
    UsersInCall {
        users: Vec<CallMember>,
    },
    ParticipantJoinedCall {
        participant_id: ParticipantId,
        display_name: String,
    },
    ParticipantLeftCall {
        participant_id: ParticipantId,
    },
    ParticipantDisconnected {
        participant_id: ParticipantId,
    },
    Offer {
        from_participant_id: ParticipantId,
        description: SessionDescription,
    },
    Answer {
        from_participant_id: ParticipantId,
        description: SessionDescription,
    },
    IceCandidate {
        from_participant_id: ParticipantId,
        candidate: IceCandidate,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
