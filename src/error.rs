//! Error types for the voice controller

use thiserror::Error;

use crate::session::VoiceState;

/// Result type alias for controller operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors surfaced by the capture, playback and exchange seams.
///
/// Every variant is local and recoverable: a subsequent user action may retry.
#[derive(Error, Debug)]
pub enum VoiceError {
    /// Microphone or camera access was refused
    #[error("{0}")]
    PermissionDenied(String),

    /// Non-2xx response or transport failure. `message` is the response body verbatim.
    #[error("{message}")]
    NetworkFailure { status: Option<u16>, message: String },

    /// Response arrived but lacked the expected fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The output device declined to start the clip, or the clip could not be decoded
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// Action not allowed in the current state
    #[error("Cannot do that while {0}")]
    Busy(VoiceState),

    /// The page binding does not handle this kind of payload
    #[error("Unsupported request: {0}")]
    Unsupported(String),

    /// Content the user asked for is not there (no quiz, no questions)
    #[error("{0}")]
    Unavailable(String),

    /// The task running the session has stopped
    #[error("Voice session is no longer running")]
    SessionClosed,

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    pub fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        VoiceError::NetworkFailure {
            status,
            message: message.into(),
        }
    }

    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::PermissionDenied(msg) => msg.clone(),
            VoiceError::NetworkFailure { message, .. } if message.trim().is_empty() => {
                "Failed to process audio. Please try again.".to_string()
            }
            VoiceError::NetworkFailure { message, .. } => message.clone(),
            // Malformed replies read the same as a failed request
            VoiceError::MalformedResponse(_) => {
                "Failed to process audio. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether this failure should be treated as a failed network exchange.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            VoiceError::NetworkFailure { .. } | VoiceError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VoiceError::MalformedResponse(err.to_string())
        } else {
            VoiceError::network(err.status().map(|s| s.as_u16()), err.to_string())
        }
    }
}

impl From<hound::Error> for VoiceError {
    fn from(err: hound::Error) -> Self {
        VoiceError::Audio(err.to_string())
    }
}

impl From<base64::DecodeError> for VoiceError {
    fn from(err: base64::DecodeError) -> Self {
        VoiceError::MalformedResponse(format!("audio_base64 is not valid base64: {}", err))
    }
}
