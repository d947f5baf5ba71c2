use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{detached, Channel};
use crate::error::{Result, SessionError};
use crate::events::{EventSink, SessionEvent};
use crate::speech::SpeechEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechStatus {
    Idle,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    Started,
    /// The same utterance was already being spoken and has been toggled off
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechSnapshot {
    pub status: SpeechStatus,
    pub text: Option<String>,
    /// Logged message being read aloud, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
}

/// What to read aloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    /// Set when reading a logged message; identifies the listen control
    pub message_id: Option<Uuid>,
}

impl Utterance {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            message_id: None,
        }
    }

    pub fn message(message_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            message_id: Some(message_id),
        }
    }

    /// Whether `self` is the same listen target as the current utterance
    fn is_same_as(&self, current: &SpeechState) -> bool {
        match self.message_id {
            Some(id) => current.message_id == Some(id),
            None => current.message_id.is_none() && current.text.as_deref() == Some(&self.text),
        }
    }
}

struct SpeechState {
    status: SpeechStatus,
    text: Option<String>,
    message_id: Option<Uuid>,
    /// The engine is starting an utterance
    pending: bool,
    generation: u64,
    poller: Option<JoinHandle<()>>,
}

/// Reads text aloud, one utterance at a time
///
/// Completion is detected by polling the engine's `is_speaking` query every
/// `poll_interval`; the first negative answer ends the utterance. Cloning
/// yields another handle to the same session.
#[derive(Clone)]
pub struct SpeechSession {
    inner: Arc<SpeechInner>,
}

struct SpeechInner {
    engine: Arc<dyn SpeechEngine>,
    poll_interval: Duration,
    state: Arc<Mutex<SpeechState>>,
    events: EventSink,
}

impl SpeechSession {
    pub fn new(engine: Arc<dyn SpeechEngine>, poll_interval: Duration, events: EventSink) -> Self {
        Self {
            inner: Arc::new(SpeechInner {
                engine,
                poll_interval,
                state: Arc::new(Mutex::new(SpeechState {
                    status: SpeechStatus::Idle,
                    text: None,
                    message_id: None,
                    pending: false,
                    generation: 0,
                    poller: None,
                })),
                events,
            }),
        }
    }

    pub async fn snapshot(&self) -> SpeechSnapshot {
        let state = self.inner.state.lock().await;
        SpeechSnapshot {
            status: state.status,
            text: state.text.clone(),
            message_id: state.message_id,
        }
    }

    /// Speak `utterance`; asking for the one already being spoken stops it instead
    ///
    /// Utterances for a logged message match on the message id, plain text
    /// utterances on the text.
    pub async fn speak(&self, utterance: Utterance) -> Result<SpeakOutcome> {
        let inner = Arc::clone(&self.inner);
        detached(Channel::Speech, async move { inner.speak(utterance).await }).await
    }

    /// Halt synthesis and polling immediately; a no-op when idle
    pub async fn stop(&self) -> Result<bool> {
        let inner = Arc::clone(&self.inner);
        detached(Channel::Speech, async move { inner.stop().await }).await
    }
}

impl SpeechInner {
    async fn speak(&self, utterance: Utterance) -> Result<SpeakOutcome> {
        {
            let mut state = self.state.lock().await;
            if state.pending {
                return Err(SessionError::Busy(Channel::Speech));
            }

            if state.status == SpeechStatus::Speaking {
                let same = utterance.is_same_as(&state);
                self.halt(&mut state).await;
                if same {
                    info!("Toggled off speech");
                    return Ok(SpeakOutcome::Stopped);
                }
            }

            state.pending = true;
        }

        let started = self.engine.speak(&utterance.text).await;

        let mut state = self.state.lock().await;
        state.pending = false;

        match started {
            Ok(()) => {
                state.generation += 1;
                state.status = SpeechStatus::Speaking;
                state.text = Some(utterance.text.clone());
                state.message_id = utterance.message_id;
                state.poller = Some(tokio::spawn(poll_until_silent(
                    Arc::clone(&self.engine),
                    Arc::clone(&self.state),
                    self.events.clone(),
                    self.poll_interval,
                    state.generation,
                )));
                self.events.emit(SessionEvent::SpeechStarted {
                    text: utterance.text,
                    message_id: utterance.message_id,
                });
                info!("Speech started");
                Ok(SpeakOutcome::Started)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Speech failed to start: {}", reason);
                state.status = SpeechStatus::Idle;
                state.text = None;
                state.message_id = None;
                self.events.emit(SessionEvent::SpeechFailed {
                    reason: reason.clone(),
                });
                Err(SessionError::resource(Channel::Speech, reason))
            }
        }
    }

    async fn stop(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.pending {
            return Err(SessionError::Busy(Channel::Speech));
        }
        if state.status != SpeechStatus::Speaking {
            return Ok(false);
        }

        self.halt(&mut state).await;
        Ok(true)
    }

    async fn halt(&self, state: &mut SpeechState) {
        if let Some(poller) = state.poller.take() {
            poller.abort();
        }
        state.status = SpeechStatus::Idle;
        state.text = None;
        state.message_id = None;

        if let Err(e) = self.engine.stop().await {
            warn!("Speech engine failed to stop cleanly: {}", e);
        }

        self.events.emit(SessionEvent::SpeechStopped);
        info!("Speech stopped");
    }
}

async fn poll_until_silent(
    engine: Arc<dyn SpeechEngine>,
    state: Arc<Mutex<SpeechState>>,
    events: EventSink,
    interval: Duration,
    generation: u64,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if engine.is_speaking().await {
            continue;
        }

        let mut state = state.lock().await;
        if state.generation != generation || state.status != SpeechStatus::Speaking {
            debug!("Dropping stale speech completion (generation {})", generation);
            return;
        }

        state.status = SpeechStatus::Idle;
        state.text = None;
        state.message_id = None;
        state.poller = None;
        events.emit(SessionEvent::SpeechFinished);
        info!("Speech finished");
        return;
    }
}
