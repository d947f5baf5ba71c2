use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{detached, Channel};
use crate::audio::{AudioPlayer, Sound};
use crate::conversation::MediaRef;
use crate::error::{Result, SessionError};
use crate::events::{EventSink, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Finished,
    Failed,
}

/// Identifies one playback started by `play`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: u64,
    pub voice_ref: MediaRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started(SessionHandle),
    /// The ref was already playing and has been toggled off
    Stopped,
}

/// Observable playback state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub active_ref: Option<MediaRef>,
}

/// The loaded sound and the task driving it
struct ActivePlayback {
    handle: SessionHandle,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct PlaybackState {
    status: PlaybackStatus,
    active: Option<SessionHandle>,
    playing: Option<ActivePlayback>,
    /// A load or release is awaiting the device
    pending: bool,
    generation: u64,
}

/// Plays voice notes, holding at most one loaded sound at a time
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<PlaybackInner>,
}

struct PlaybackInner {
    player: Arc<dyn AudioPlayer>,
    state: Arc<Mutex<PlaybackState>>,
    events: EventSink,
}

impl PlaybackSession {
    pub fn new(player: Arc<dyn AudioPlayer>, events: EventSink) -> Self {
        Self {
            inner: Arc::new(PlaybackInner {
                player,
                state: Arc::new(Mutex::new(PlaybackState {
                    status: PlaybackStatus::Idle,
                    active: None,
                    playing: None,
                    pending: false,
                    generation: 0,
                })),
                events,
            }),
        }
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.inner.state.lock().await;
        PlaybackSnapshot {
            status: state.status,
            active_ref: state.active.as_ref().map(|h| h.voice_ref.clone()),
        }
    }

    /// Play `voice_ref`, or stop it if it is the one already playing
    ///
    /// Any other playing sound is released (and awaited) before the new one
    /// is loaded.
    pub async fn play(&self, voice_ref: MediaRef) -> Result<PlayOutcome> {
        let inner = Arc::clone(&self.inner);
        detached(Channel::Playback, async move { inner.play(voice_ref).await }).await
    }

    /// Stop the playback identified by `handle`; stale handles are ignored
    pub async fn stop(&self, handle: &SessionHandle) -> Result<bool> {
        let inner = Arc::clone(&self.inner);
        let id = handle.id;
        detached(Channel::Playback, async move {
            inner.stop_matching(move |active| active.id == id).await
        })
        .await
    }

    /// Stop whatever is playing
    pub async fn stop_active(&self) -> Result<bool> {
        let inner = Arc::clone(&self.inner);
        detached(Channel::Playback, async move { inner.stop_matching(|_| true).await }).await
    }
}

impl PlaybackInner {
    async fn play(&self, voice_ref: MediaRef) -> Result<PlayOutcome> {
        let (prior, handle) = {
            let mut state = self.state.lock().await;
            if state.pending {
                return Err(SessionError::Busy(Channel::Playback));
            }

            let same_ref = state
                .active
                .as_ref()
                .map(|h| h.voice_ref == voice_ref)
                .unwrap_or(false);

            if state.status == PlaybackStatus::Playing && same_ref {
                let active = state.playing.take();
                state.pending = true;
                drop(state);

                info!("Toggling off playback of {}", voice_ref);
                self.release_into_idle(active).await;
                return Ok(PlayOutcome::Stopped);
            }

            state.generation += 1;
            let handle = SessionHandle {
                id: state.generation,
                voice_ref: voice_ref.clone(),
            };
            state.pending = true;
            state.status = PlaybackStatus::Loading;
            state.active = Some(handle.clone());
            (state.playing.take(), handle)
        };

        if let Some(prior) = prior {
            let prior_ref = prior.handle.voice_ref.clone();
            release(prior).await;
            info!("Released {} before loading {}", prior_ref, voice_ref);
            self.events.emit(SessionEvent::PlaybackStopped { voice_ref: prior_ref });
        }

        info!("Loading {}", voice_ref);
        let loaded = self.player.load(voice_ref.as_str()).await;

        let mut state = self.state.lock().await;
        state.pending = false;

        match loaded {
            Ok(sound) => {
                let (cancel, cancel_rx) = oneshot::channel();
                let task = tokio::spawn(drive(
                    sound,
                    cancel_rx,
                    Arc::clone(&self.state),
                    self.events.clone(),
                    handle.id,
                ));

                state.playing = Some(ActivePlayback {
                    handle: handle.clone(),
                    cancel,
                    task,
                });
                state.status = PlaybackStatus::Playing;
                self.events.emit(SessionEvent::PlaybackStarted {
                    handle: handle.clone(),
                });
                info!("Playing {}", voice_ref);
                Ok(PlayOutcome::Started(handle))
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Failed to load {}: {}", voice_ref, reason);
                state.status = PlaybackStatus::Failed;
                state.active = None;
                self.events.emit(SessionEvent::PlaybackFailed {
                    voice_ref,
                    reason: reason.clone(),
                });
                Err(SessionError::resource(Channel::Playback, reason))
            }
        }
    }

    async fn stop_matching(&self, matches: impl Fn(&SessionHandle) -> bool) -> Result<bool> {
        let active = {
            let mut state = self.state.lock().await;
            if state.pending {
                return Err(SessionError::Busy(Channel::Playback));
            }

            let is_match = state.status == PlaybackStatus::Playing
                && state.active.as_ref().map(&matches).unwrap_or(false);
            if !is_match {
                debug!("No matching playback to stop");
                return Ok(false);
            }

            state.pending = true;
            state.playing.take()
        };

        self.release_into_idle(active).await;
        Ok(true)
    }

    /// Release the sound, then settle to `Idle` (pending must already be set)
    async fn release_into_idle(&self, active: Option<ActivePlayback>) {
        if let Some(active) = active {
            release(active).await;
        }

        let mut state = self.state.lock().await;
        let stopped = state.active.take();
        state.status = PlaybackStatus::Idle;
        state.pending = false;

        if let Some(handle) = stopped {
            info!("Playback stopped: {}", handle.voice_ref);
            self.events.emit(SessionEvent::PlaybackStopped {
                voice_ref: handle.voice_ref,
            });
        }
    }
}

/// Cancel the playback task and wait until its sound is unloaded
async fn release(active: ActivePlayback) {
    let _ = active.cancel.send(());
    if let Err(e) = active.task.await {
        error!("Playback task panicked: {}", e);
    }
}

/// Play to the end (or until cancelled), unload, then report natural completion
async fn drive(
    mut sound: Box<dyn Sound>,
    cancel_rx: oneshot::Receiver<()>,
    state: Arc<Mutex<PlaybackState>>,
    events: EventSink,
    generation: u64,
) {
    let outcome = tokio::select! {
        result = sound.play() => Some(result),
        _ = cancel_rx => None,
    };

    if let Err(e) = sound.unload().await {
        warn!("Failed to unload sound: {}", e);
    }

    let Some(result) = outcome else {
        return;
    };

    let mut state = state.lock().await;
    if state.pending || state.generation != generation || state.status != PlaybackStatus::Playing {
        debug!("Dropping stale playback completion (generation {})", generation);
        return;
    }

    state.playing = None;
    let Some(handle) = state.active.take() else {
        return;
    };

    match result {
        Ok(()) => {
            state.status = PlaybackStatus::Finished;
            info!("Playback finished: {}", handle.voice_ref);
            events.emit(SessionEvent::PlaybackFinished {
                voice_ref: handle.voice_ref,
            });
        }
        Err(e) => {
            let reason = format!("{:#}", e);
            warn!("Playback of {} failed: {}", handle.voice_ref, reason);
            state.status = PlaybackStatus::Failed;
            let notice = SessionError::resource(Channel::Playback, &reason).user_message();
            events.emit(SessionEvent::PlaybackFailed {
                voice_ref: handle.voice_ref,
                reason,
            });
            if let Some(text) = notice {
                events.emit(SessionEvent::Notice { text });
            }
        }
    }
}
