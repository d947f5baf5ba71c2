//! Error types for conversation sessions
//!
//! Device and infrastructure code returns `anyhow::Result`; sessions catch
//! those failures at their boundary and convert them into `SessionError`.

use crate::permission::Capability;
use crate::session::Channel;
use thiserror::Error;

/// Errors reported by the coordinator and its sessions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// User declined access to a device capability
    #[error("{0} permission denied")]
    PermissionDenied(Capability),

    /// Activation requested while the channel is already active
    #[error("{0} session already active")]
    AlreadyActive(Channel),

    /// Command issued while another command on the channel is in flight
    #[error("{0} session busy")]
    Busy(Channel),

    /// I/O failure while recording, playing or synthesizing
    #[error("{channel} resource failure: {reason}")]
    ResourceFailure { channel: Channel, reason: String },

    /// Send attempted with nothing to send
    #[error("composing message is empty")]
    Empty,

    /// Referenced message does not exist in the conversation log
    #[error("message {0} not found")]
    NotFound(String),
}

impl SessionError {
    pub(crate) fn resource(channel: Channel, err: impl std::fmt::Display) -> Self {
        SessionError::ResourceFailure {
            channel,
            reason: err.to_string(),
        }
    }

    /// User-facing notice for this error, if it should be surfaced at all
    ///
    /// Guards (`AlreadyActive`, `Busy`) and `Empty` are never shown; controls
    /// should be disabled instead.
    pub fn user_message(&self) -> Option<String> {
        match self {
            SessionError::PermissionDenied(Capability::Microphone) => Some(
                "Microphone access is needed to record voice messages.".to_string(),
            ),
            SessionError::PermissionDenied(Capability::MediaLibrary) => {
                Some("Photo library access is needed to attach images.".to_string())
            }
            SessionError::ResourceFailure { channel, .. } => Some(match channel {
                Channel::Recording => "Recording failed. Please try again.".to_string(),
                Channel::Playback => "Could not play this voice message.".to_string(),
                Channel::Speech => "Could not read this message aloud.".to_string(),
            }),
            SessionError::NotFound(_) => Some("That message is no longer available.".to_string()),
            SessionError::AlreadyActive(_) | SessionError::Busy(_) | SessionError::Empty => None,
        }
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
