//! Conversation audio sessions
//!
//! This module provides the three independent audio channels:
//! - `RecordingSession`: microphone capture into voice notes
//! - `PlaybackSession`: voice note playback, one sound at a time
//! - `SpeechSession`: text-to-speech with polled completion
//!
//! Each session serializes its own transitions. Commands issued while a
//! device call is in flight are rejected with `Busy`, never queued.
//! Transitions run on their own task, so a caller that goes away mid-command
//! (e.g. a disconnected HTTP client) still leaves the session settled.

mod config;
mod playback;
mod recording;
mod speech;

use serde::Serialize;
use std::fmt;
use std::future::Future;

use crate::error::{Result, SessionError};

pub use config::SessionConfig;
pub use playback::{PlayOutcome, PlaybackSession, PlaybackSnapshot, PlaybackStatus, SessionHandle};
pub use recording::{RecordingSession, RecordingStatus, StopOutcome};
pub use speech::{SpeakOutcome, SpeechSession, SpeechSnapshot, SpeechStatus, Utterance};

/// Audio channel a session operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Recording,
    Playback,
    Speech,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Recording => write!(f, "recording"),
            Channel::Playback => write!(f, "playback"),
            Channel::Speech => write!(f, "speech"),
        }
    }
}

/// Run a session transition to completion on its own task
///
/// Dropping the returned future does not cancel the transition.
pub(crate) async fn detached<T, F>(channel: Channel, transition: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(transition)
        .await
        .map_err(|e| SessionError::resource(channel, format!("transition task failed: {}", e)))?
}
