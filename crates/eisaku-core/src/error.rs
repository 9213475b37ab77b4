//! Error types shared by the exam client and the transcript store.

use thiserror::Error;

/// Failure of a single remote exam operation.
///
/// Every variant is handled the same way by the controller: the placeholder
/// settles to the localized error message and the session returns to idle.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("exam service returned status {status}")]
    RemoteError { status: u16 },

    #[error("response contained none of the fields {expected:?}")]
    MalformedResponse { expected: &'static [&'static str] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("message handle {0} does not refer to a transcript entry")]
    InvalidHandle(usize),

    #[error("message {0} is already settled")]
    AlreadySettled(usize),
}
