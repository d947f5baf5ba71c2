// Shared fakes for session and coordinator tests
//
// Each fake exposes a cloneable control handle so tests can script device
// behavior (failures, durations) and observe what the sessions did.

#![allow(dead_code)]

use anyhow::{bail, Result};
use loqa_companion::{
    AudioBackend, AudioFrame, AudioPlayer, Devices, PermissionGate, SessionConfig,
    SessionCoordinator, SpeechEngine, Sound, StaticPermissionGate,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

// ============================================================================
// Capture
// ============================================================================

#[derive(Clone)]
pub struct BackendControl {
    pub fail_start: Arc<AtomicBool>,
    pub fail_stop: Arc<AtomicBool>,
    pub hang_stop: Arc<AtomicBool>,
    /// Milliseconds `stop` takes before returning
    pub stop_delay_ms: Arc<AtomicU64>,
    pub frames_per_start: Arc<AtomicUsize>,
    pub starts: Arc<AtomicUsize>,
}

impl Default for BackendControl {
    fn default() -> Self {
        Self {
            fail_start: Arc::new(AtomicBool::new(false)),
            fail_stop: Arc::new(AtomicBool::new(false)),
            hang_stop: Arc::new(AtomicBool::new(false)),
            stop_delay_ms: Arc::new(AtomicU64::new(0)),
            frames_per_start: Arc::new(AtomicUsize::new(5)),
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Backend that emits a fixed number of 100ms frames on start and keeps the
/// channel open until stopped
pub struct ScriptedBackend {
    control: BackendControl,
    tx: Option<mpsc::Sender<AudioFrame>>,
}

impl ScriptedBackend {
    pub fn new(control: BackendControl) -> Self {
        Self { control, tx: None }
    }
}

pub fn silent_frame(timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![0i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
    }
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.control.fail_start.load(Ordering::SeqCst) {
            bail!("no input device");
        }
        self.control.starts.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(100);
        for i in 0..self.control.frames_per_start.load(Ordering::SeqCst) {
            tx.send(silent_frame(i as u64 * 100)).await?;
        }
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if self.control.hang_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = self.control.stop_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.tx = None;
        if self.control.fail_stop.load(Ordering::SeqCst) {
            bail!("device disconnected");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Playback
// ============================================================================

#[derive(Clone, Default)]
pub struct PlayerControl {
    /// Sounds currently loaded
    pub loaded: Arc<AtomicUsize>,
    /// Highest number of sounds ever loaded at once
    pub max_loaded: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
    pub fail_load: Arc<Mutex<HashSet<String>>>,
    pub fail_play: Arc<Mutex<HashSet<String>>>,
    pub durations: Arc<Mutex<HashMap<String, Duration>>>,
}

impl PlayerControl {
    pub fn set_duration(&self, source: &str, duration: Duration) {
        self.durations
            .lock()
            .unwrap()
            .insert(source.to_string(), duration);
    }

    pub fn fail_load(&self, source: &str) {
        self.fail_load.lock().unwrap().insert(source.to_string());
    }

    pub fn fail_play(&self, source: &str) {
        self.fail_play.lock().unwrap().insert(source.to_string());
    }

    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn max_loaded(&self) -> usize {
        self.max_loaded.load(Ordering::SeqCst)
    }
}

pub struct FakePlayer {
    control: PlayerControl,
    load_delay: Duration,
}

impl FakePlayer {
    pub fn new(control: PlayerControl) -> Self {
        Self {
            control,
            load_delay: Duration::from_millis(50),
        }
    }
}

#[async_trait::async_trait]
impl AudioPlayer for FakePlayer {
    async fn load(&self, source: &str) -> Result<Box<dyn Sound>> {
        tokio::time::sleep(self.load_delay).await;
        self.control.loads.fetch_add(1, Ordering::SeqCst);

        if self.control.fail_load.lock().unwrap().contains(source) {
            bail!("unsupported audio format");
        }

        let now = self.control.loaded.fetch_add(1, Ordering::SeqCst) + 1;
        self.control.max_loaded.fetch_max(now, Ordering::SeqCst);

        let duration = self
            .control
            .durations
            .lock()
            .unwrap()
            .get(source)
            .copied()
            .unwrap_or(Duration::from_secs(30));
        let fails = self.control.fail_play.lock().unwrap().contains(source);

        Ok(Box::new(FakeSound {
            control: self.control.clone(),
            duration,
            fails,
            loaded: true,
        }))
    }
}

struct FakeSound {
    control: PlayerControl,
    duration: Duration,
    fails: bool,
    loaded: bool,
}

#[async_trait::async_trait]
impl Sound for FakeSound {
    async fn play(&mut self) -> Result<()> {
        tokio::time::sleep(self.duration).await;
        if self.fails {
            bail!("decoder error");
        }
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        if self.loaded {
            self.loaded = false;
            self.control.loaded.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Speech
// ============================================================================

#[derive(Clone)]
pub struct SpeechControl {
    /// Answers returned by successive `is_speaking` polls
    pub script: Arc<Mutex<VecDeque<bool>>>,
    /// Answer once the script is exhausted
    pub default_speaking: Arc<AtomicBool>,
    pub polls: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub fail_speak: Arc<AtomicBool>,
    /// Milliseconds `speak` takes before the engine starts talking
    pub speak_delay_ms: Arc<AtomicU64>,
}

impl Default for SpeechControl {
    fn default() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_speaking: Arc::new(AtomicBool::new(true)),
            polls: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            fail_speak: Arc::new(AtomicBool::new(false)),
            speak_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl SpeechControl {
    pub fn script(&self, answers: &[bool]) {
        let mut script = self.script.lock().unwrap();
        script.clear();
        script.extend(answers.iter().copied());
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

pub struct FakeSpeechEngine {
    control: SpeechControl,
}

impl FakeSpeechEngine {
    pub fn new(control: SpeechControl) -> Self {
        Self { control }
    }
}

#[async_trait::async_trait]
impl SpeechEngine for FakeSpeechEngine {
    async fn speak(&self, _text: &str) -> Result<()> {
        let delay = self.control.speak_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.control.fail_speak.load(Ordering::SeqCst) {
            bail!("voice not installed");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.control.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_speaking(&self) -> bool {
        self.control.polls.fetch_add(1, Ordering::SeqCst);
        self.control
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.control.default_speaking.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Coordinator harness
// ============================================================================

pub struct Harness {
    pub coordinator: SessionCoordinator,
    pub backend: BackendControl,
    pub player: PlayerControl,
    pub speech: SpeechControl,
    pub permissions: Arc<StaticPermissionGate>,
    pub recordings: TempDir,
}

pub fn test_config(recordings: &TempDir) -> SessionConfig {
    SessionConfig {
        recordings_dir: recordings.path().to_path_buf(),
        speech_poll_interval: Duration::from_millis(10),
        finalize_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    }
}

pub fn harness() -> Result<Harness> {
    harness_with_permissions(StaticPermissionGate::allow_all())
}

pub fn harness_with_permissions(gate: StaticPermissionGate) -> Result<Harness> {
    let recordings = TempDir::new()?;
    let backend = BackendControl::default();
    let player = PlayerControl::default();
    let speech = SpeechControl::default();
    let permissions = Arc::new(gate);

    let devices = Devices {
        permissions: Arc::clone(&permissions) as Arc<dyn PermissionGate>,
        capture: Box::new(ScriptedBackend::new(backend.clone())),
        player: Arc::new(FakePlayer::new(player.clone())),
        speech: Arc::new(FakeSpeechEngine::new(speech.clone())),
    };

    let coordinator = SessionCoordinator::new(test_config(&recordings), devices);

    Ok(Harness {
        coordinator,
        backend,
        player,
        speech,
        permissions,
        recordings,
    })
}

/// Poll `check` every 5ms until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check().await
}
