//! Session coordinator
//!
//! Owns the recording, playback and speech sessions together with the draft
//! message, and is the only writer of the draft. The three audio channels are
//! independent: activating one never stops another.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioPlayer, AudioSource, FilePlayer,
};
use crate::config::Config;
use crate::conversation::{ComposingMessage, ConversationLog, MediaRef, Message};
use crate::error::{Result, SessionError};
use crate::events::{EventSink, SessionEvent};
use crate::permission::{Capability, PermissionGate, PermissionStatus, StaticPermissionGate};
use crate::session::{
    PlayOutcome, PlaybackSession, PlaybackSnapshot, RecordingSession, RecordingStatus,
    SessionConfig, SessionHandle, SpeakOutcome, SpeechSession, SpeechSnapshot, StopOutcome,
    Utterance,
};
use crate::session::{detached, Channel};
use crate::speech::{PacedSpeechEngine, SpeechEngine};

/// Devices the coordinator drives
pub struct Devices {
    pub permissions: Arc<dyn PermissionGate>,
    pub capture: Box<dyn AudioBackend>,
    pub player: Arc<dyn AudioPlayer>,
    pub speech: Arc<dyn SpeechEngine>,
}

/// Point-in-time view of every session and the draft
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub recording: RecordingStatus,
    pub playback: PlaybackSnapshot,
    pub speech: SpeechSnapshot,
    pub composing: ComposingMessage,
    pub message_count: usize,
}

pub struct SessionCoordinator {
    permissions: Arc<dyn PermissionGate>,
    recording: RecordingSession,
    playback: PlaybackSession,
    speech: SpeechSession,
    composing: Arc<Mutex<ComposingMessage>>,
    log: ConversationLog,
    events: EventSink,
}

impl SessionCoordinator {
    pub fn new(config: SessionConfig, devices: Devices) -> Self {
        Self::with_log(config, devices, ConversationLog::new())
    }

    /// Coordinator appending to an existing conversation log
    pub fn with_log(config: SessionConfig, devices: Devices, log: ConversationLog) -> Self {
        let events = EventSink::new(config.event_capacity);

        Self {
            permissions: Arc::clone(&devices.permissions),
            recording: RecordingSession::new(
                config.clone(),
                devices.permissions,
                devices.capture,
                events.clone(),
            ),
            playback: PlaybackSession::new(devices.player, events.clone()),
            speech: SpeechSession::new(devices.speech, config.speech_poll_interval, events.clone()),
            composing: Arc::new(Mutex::new(ComposingMessage::new())),
            log,
            events,
        }
    }

    /// Build the coordinator with the devices named in the service config
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let session_config = cfg.session_config();

        let source = AudioSource::from_config(&cfg.capture.source, cfg.capture.file_path.as_deref())?;
        let capture = AudioBackendFactory::create(
            source,
            AudioBackendConfig {
                target_sample_rate: session_config.sample_rate,
                target_channels: session_config.channels,
                ..AudioBackendConfig::default()
            },
        )?;

        let devices = Devices {
            permissions: Arc::new(StaticPermissionGate::new(
                cfg.permissions.microphone,
                cfg.permissions.media_library,
            )),
            capture,
            player: Arc::new(FilePlayer::new()),
            speech: Arc::new(PacedSpeechEngine::new(cfg.speech.words_per_minute)),
        };

        Ok(Self::new(session_config, devices))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Pass-through for collaborators (e.g. an image picker) that need a grant
    pub async fn request_permission(&self, capability: Capability) -> PermissionStatus {
        let status = self.permissions.request(capability).await;
        if !status.is_granted() {
            self.surface(&SessionError::PermissionDenied(capability));
        }
        status
    }

    // ------------------------------------------------------------------
    // Draft editing
    // ------------------------------------------------------------------

    pub async fn set_text(&self, text: impl Into<String>) {
        self.edit(|draft| draft.set_text(text)).await;
    }

    pub async fn attach_image(&self, image_ref: MediaRef) {
        info!("Attaching image {}", image_ref);
        self.edit(|draft| draft.attach_image(image_ref)).await;
    }

    pub async fn detach_image(&self) -> Option<MediaRef> {
        self.edit(|draft| draft.detach_image()).await
    }

    pub async fn detach_voice(&self) -> Option<MediaRef> {
        self.edit(|draft| draft.detach_voice()).await
    }

    pub async fn clear_composing(&self) {
        self.edit(|draft| draft.clear()).await;
    }

    pub async fn composing(&self) -> ComposingMessage {
        self.composing.lock().await.clone()
    }

    /// Flush the draft into the conversation log
    ///
    /// `Empty` is returned for an empty draft and is not surfaced to the user.
    pub async fn try_send(&self) -> Result<Message> {
        let mut draft = self.composing.lock().await;
        let message = draft.try_send(&self.log).await?;

        info!("Message {} sent", message.id());
        self.events.emit(SessionEvent::MessageAppended {
            message: message.clone(),
        });
        self.events.emit(SessionEvent::ComposingChanged {
            composing: draft.clone(),
        });

        Ok(message)
    }

    /// Append a message handed over by the transport (typically the assistant's reply)
    pub async fn receive(&self, message: Message) {
        info!("Received message {} from {:?}", message.id(), message.sender());
        self.log.append(message.clone()).await;
        self.events.emit(SessionEvent::MessageAppended { message });
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.log.snapshot().await
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    pub async fn start_recording(&self) -> Result<()> {
        self.report(self.recording.start().await)
    }

    /// Stop recording; a finalized voice note is attached to the draft
    ///
    /// The attach completes even if the caller stops waiting.
    pub async fn stop_recording(&self) -> Result<StopOutcome> {
        let recording = self.recording.clone();
        let composing = Arc::clone(&self.composing);
        let events = self.events.clone();

        detached(Channel::Recording, async move {
            let outcome = report(&events, recording.stop().await)?;

            if let StopOutcome::Finalized(voice_ref) = &outcome {
                let voice_ref = voice_ref.clone();
                edit_draft(&composing, &events, |draft| draft.attach_voice(voice_ref)).await;
            }

            Ok(outcome)
        })
        .await
    }

    /// Microphone button: start when not recording, stop otherwise
    pub async fn toggle_recording(&self) -> Result<RecordingStatus> {
        if self.recording.is_recording().await {
            self.stop_recording().await?;
        } else {
            self.start_recording().await?;
        }
        Ok(self.recording.status().await)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub async fn play(&self, voice_ref: MediaRef) -> Result<PlayOutcome> {
        self.report(self.playback.play(voice_ref).await)
    }

    /// Stop a specific playback, or whatever is playing when `handle` is `None`
    pub async fn stop_playback(&self, handle: Option<&SessionHandle>) -> Result<bool> {
        let stopped = match handle {
            Some(handle) => self.playback.stop(handle).await,
            None => self.playback.stop_active().await,
        };
        self.report(stopped)
    }

    // ------------------------------------------------------------------
    // Speech
    // ------------------------------------------------------------------

    pub async fn speak(&self, text: &str) -> Result<SpeakOutcome> {
        self.report(self.speech.speak(Utterance::text(text)).await)
    }

    /// Read a logged message aloud (listen/stop control on a message bubble)
    pub async fn speak_message(&self, id: Uuid) -> Result<SpeakOutcome> {
        let message = self
            .log
            .get(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()));
        let message = self.report(message)?;

        let text = message.text_content().ok_or(SessionError::Empty)?;
        self.report(self.speech.speak(Utterance::message(id, text)).await)
    }

    pub async fn stop_speech(&self) -> Result<bool> {
        self.report(self.speech.stop().await)
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let composing = self.composing.lock().await;

        CoordinatorStatus {
            recording: self.recording.status().await,
            playback: self.playback.snapshot().await,
            speech: self.speech.snapshot().await,
            composing: composing.clone(),
            message_count: self.log.len().await,
        }
    }

    async fn edit<T>(&self, apply: impl FnOnce(&mut ComposingMessage) -> T) -> T {
        edit_draft(&self.composing, &self.events, apply).await
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        report(&self.events, result)
    }

    fn surface(&self, err: &SessionError) {
        surface(&self.events, err)
    }
}

async fn edit_draft<T>(
    composing: &Mutex<ComposingMessage>,
    events: &EventSink,
    apply: impl FnOnce(&mut ComposingMessage) -> T,
) -> T {
    let mut draft = composing.lock().await;
    let result = apply(&mut draft);
    events.emit(SessionEvent::ComposingChanged {
        composing: draft.clone(),
    });
    result
}

/// Surface user-visible failures as notices, then pass the result through
fn report<T>(events: &EventSink, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        surface(events, e);
    }
    result
}

fn surface(events: &EventSink, err: &SessionError) {
    match err.user_message() {
        Some(text) => {
            warn!("{}", err);
            events.emit(SessionEvent::Notice { text });
        }
        None => info!("Ignored command: {}", err),
    }
}
