use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::{detached, Channel};
use crate::audio::{AudioBackend, AudioFrame, VoiceNoteMetadata, VoiceNoteWriter};
use crate::conversation::MediaRef;
use crate::error::{Result, SessionError};
use crate::events::{EventSink, SessionEvent};
use crate::permission::{Capability, PermissionGate};

/// Lifecycle of the voice capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordingStatus {
    Idle,
    Recording { started_at: DateTime<Utc> },
    Finalizing { started_at: DateTime<Utc> },
    Finalized { voice_ref: MediaRef },
    Failed { reason: String },
}

/// Result of a `stop()` call that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The capture was finalized into a voice note
    Finalized(MediaRef),
    /// Nothing was recording
    NotRecording,
    /// A previous stop is still finalizing; it will reach a terminal state on its own
    AlreadyFinalizing,
}

/// In-flight capture: the task writing frames to the voice note
struct Capture {
    stop_tx: oneshot::Sender<()>,
    writer: JoinHandle<anyhow::Result<VoiceNoteMetadata>>,
    path: PathBuf,
}

struct RecordingState {
    status: RecordingStatus,
    /// A start or stop is awaiting the device
    pending: bool,
    capture: Option<Capture>,
}

/// Owns the microphone capture and turns it into voice notes
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct RecordingSession {
    inner: Arc<RecordingInner>,
}

struct RecordingInner {
    config: SessionConfig,
    permissions: Arc<dyn PermissionGate>,
    backend: Mutex<Box<dyn AudioBackend>>,
    state: Mutex<RecordingState>,
    events: EventSink,
}

impl RecordingSession {
    pub fn new(
        config: SessionConfig,
        permissions: Arc<dyn PermissionGate>,
        backend: Box<dyn AudioBackend>,
        events: EventSink,
    ) -> Self {
        info!("Recording session using {} backend", backend.name());

        Self {
            inner: Arc::new(RecordingInner {
                config,
                permissions,
                backend: Mutex::new(backend),
                state: Mutex::new(RecordingState {
                    status: RecordingStatus::Idle,
                    pending: false,
                    capture: None,
                }),
                events,
            }),
        }
    }

    pub async fn status(&self) -> RecordingStatus {
        self.inner.state.lock().await.status.clone()
    }

    pub async fn is_recording(&self) -> bool {
        matches!(
            self.inner.state.lock().await.status,
            RecordingStatus::Recording { .. }
        )
    }

    /// Start capturing a new voice note
    ///
    /// Rejects with `AlreadyActive` while recording and `Busy` while a
    /// command is in flight or the previous note is finalizing. The
    /// microphone permission is requested on every attempt.
    pub async fn start(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        detached(Channel::Recording, async move { inner.start().await }).await
    }

    /// Stop capturing and finalize the voice note
    ///
    /// A no-op unless recording. While a previous stop is finalizing this
    /// returns `AlreadyFinalizing`. Device or file errors end in `Failed`.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let inner = Arc::clone(&self.inner);
        detached(Channel::Recording, async move { inner.stop().await }).await
    }
}

impl RecordingInner {
    async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.pending {
                return Err(SessionError::Busy(Channel::Recording));
            }
            match state.status {
                RecordingStatus::Recording { .. } => {
                    warn!("Recording already started");
                    return Err(SessionError::AlreadyActive(Channel::Recording));
                }
                RecordingStatus::Finalizing { .. } => {
                    return Err(SessionError::Busy(Channel::Recording));
                }
                _ => {}
            }
            state.pending = true;
        }

        if !self.permissions.request(Capability::Microphone).await.is_granted() {
            warn!("Microphone permission denied, recording not started");
            self.state.lock().await.pending = false;
            return Err(SessionError::PermissionDenied(Capability::Microphone));
        }

        let started = self.open_capture().await;

        let mut state = self.state.lock().await;
        state.pending = false;

        match started {
            Ok(capture) => {
                let started_at = Utc::now();
                state.capture = Some(capture);
                state.status = RecordingStatus::Recording { started_at };
                self.events.emit(SessionEvent::RecordingStarted { started_at });
                info!("Recording started");
                Ok(())
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Failed to start recording: {}", reason);
                state.status = RecordingStatus::Failed {
                    reason: reason.clone(),
                };
                self.events.emit(SessionEvent::RecordingFailed {
                    reason: reason.clone(),
                });
                Err(SessionError::resource(Channel::Recording, reason))
            }
        }
    }

    async fn stop(&self) -> Result<StopOutcome> {
        let capture = {
            let mut state = self.state.lock().await;
            match state.status.clone() {
                RecordingStatus::Finalizing { .. } => return Ok(StopOutcome::AlreadyFinalizing),
                _ if state.pending => return Err(SessionError::Busy(Channel::Recording)),
                RecordingStatus::Recording { started_at } => {
                    state.status = RecordingStatus::Finalizing { started_at };
                    state.pending = true;
                    state.capture.take()
                }
                _ => return Ok(StopOutcome::NotRecording),
            }
        };

        info!("Stopping recording");
        let finalized = self.finalize(capture).await;

        let mut state = self.state.lock().await;
        state.pending = false;

        match finalized {
            Ok(note) => {
                let voice_ref = MediaRef::new(note.uri());
                state.status = RecordingStatus::Finalized {
                    voice_ref: voice_ref.clone(),
                };
                self.events.emit(SessionEvent::RecordingFinalized {
                    voice_ref: voice_ref.clone(),
                });
                info!("Recording finalized: {}", voice_ref);
                Ok(StopOutcome::Finalized(voice_ref))
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Recording failed: {}", reason);
                state.status = RecordingStatus::Failed {
                    reason: reason.clone(),
                };
                self.events.emit(SessionEvent::RecordingFailed {
                    reason: reason.clone(),
                });
                Err(SessionError::resource(Channel::Recording, reason))
            }
        }
    }

    async fn open_capture(&self) -> anyhow::Result<Capture> {
        let note_id = uuid::Uuid::new_v4().to_string();
        let writer = VoiceNoteWriter::new(&self.config.recordings_dir, &note_id)?;
        let path = writer.path().to_path_buf();

        let audio_rx = {
            let mut backend = self.backend.lock().await;
            backend
                .start()
                .await
                .context("Failed to start audio capture")?
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let writer = tokio::spawn(write_voice_note(audio_rx, writer, stop_rx));

        Ok(Capture {
            stop_tx,
            writer,
            path,
        })
    }

    async fn finalize(&self, capture: Option<Capture>) -> anyhow::Result<VoiceNoteMetadata> {
        let capture = capture.context("Recording has no capture task")?;
        let timeout = self.config.finalize_timeout;

        let stopped = {
            let mut backend = self.backend.lock().await;
            match tokio::time::timeout(timeout, backend.stop()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("Capture device did not stop within {:?}", timeout)),
            }
        };

        // The writer drains whatever the device buffered before the stop signal
        let _ = capture.stop_tx.send(());
        let note = join_writer(capture.writer, &capture.path, timeout).await;

        if let Err(e) = stopped {
            if let Ok(partial) = &note {
                if let Err(rm) = std::fs::remove_file(&partial.file_path) {
                    warn!("Failed to discard partial voice note: {}", rm);
                }
            }
            return Err(e.context("Capture device failed while stopping"));
        }

        note
    }
}

/// Wait for the writer to close the note
///
/// On timeout the writer is aborted and its partial file removed.
async fn join_writer(
    mut writer: JoinHandle<anyhow::Result<VoiceNoteMetadata>>,
    path: &Path,
    timeout: Duration,
) -> anyhow::Result<VoiceNoteMetadata> {
    match tokio::time::timeout(timeout, &mut writer).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(anyhow!("Voice note writer panicked: {}", e)),
        Err(_) => {
            writer.abort();
            // The aborted task drops (and flushes) its writer before this resolves
            let _ = writer.await;
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to discard partial voice note: {}", e);
                }
            }
            Err(anyhow!("Voice note writer did not finish within {:?}", timeout))
        }
    }
}

async fn write_voice_note(
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    mut writer: VoiceNoteWriter,
    mut stop_rx: oneshot::Receiver<()>,
) -> anyhow::Result<VoiceNoteMetadata> {
    loop {
        tokio::select! {
            frame = audio_rx.recv() => match frame {
                Some(frame) => writer.write_frame(&frame)?,
                None => break,
            },
            _ = &mut stop_rx => {
                while let Ok(frame) = audio_rx.try_recv() {
                    writer.write_frame(&frame)?;
                }
                break;
            }
        }
    }

    writer.finish()
}
