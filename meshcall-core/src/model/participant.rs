use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a meeting participant, supplied by the session provider.
///
/// Ordering is plain lexicographic byte order of the underlying string. Both
/// ends of a pair rely on this order to agree on politeness, so it is part of
/// the wire protocol and must not change.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Politeness role of `local` on the link to `remote`.
///
/// The side with the lesser id is polite: on an offer collision it rolls back
/// its own offer and answers the remote one, while the impolite side ignores
/// the colliding offer. For distinct ids exactly one side of a pair is polite.
pub fn is_polite(local: &ParticipantId, remote: &ParticipantId) -> bool {
    local < remote
}
