//! Session events published to the rendering layer
//!
//! Sessions emit while holding their own state lock, so events for one
//! session arrive in the order the transitions happened.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::conversation::{ComposingMessage, MediaRef, Message};
use crate::session::SessionHandle;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    RecordingStarted { started_at: DateTime<Utc> },
    RecordingFinalized { voice_ref: MediaRef },
    RecordingFailed { reason: String },

    PlaybackStarted { handle: SessionHandle },
    PlaybackStopped { voice_ref: MediaRef },
    PlaybackFinished { voice_ref: MediaRef },
    PlaybackFailed { voice_ref: MediaRef, reason: String },

    SpeechStarted {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<Uuid>,
    },
    SpeechFinished,
    SpeechStopped,
    SpeechFailed { reason: String },

    ComposingChanged { composing: ComposingMessage },
    MessageAppended { message: Message },

    /// Transient user-facing notice (permission denied, resource failure)
    Notice { text: String },
}

/// Cloneable publisher for session events
#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; having no subscribers is fine
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("Session event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}
