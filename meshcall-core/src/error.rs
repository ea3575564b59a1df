use thiserror::Error;

/// Rejection of a signaling payload at the protocol boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid signaling json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing or empty field `{0}`")]
    EmptyField(&'static str),

    #[error("expected a {expected} description, got {actual}")]
    UnexpectedSdpType {
        expected: &'static str,
        actual: &'static str,
    },
}
