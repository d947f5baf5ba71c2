//! Text-to-speech engine abstraction
//!
//! Engines start an utterance and report through `is_speaking` whether it is
//! still running. Completion is detected by polling that query.

use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Speech synthesis device
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Begin speaking `text`; returns once synthesis has started
    async fn speak(&self, text: &str) -> Result<()>;

    /// Halt synthesis immediately
    async fn stop(&self) -> Result<()>;

    /// Whether an utterance is still being spoken
    async fn is_speaking(&self) -> bool;
}

/// Engine pacing utterances by word count
///
/// Stands in for a platform synthesizer: an utterance lasts as long as it
/// would take to read it at `words_per_minute`.
pub struct PacedSpeechEngine {
    words_per_minute: u32,
    speaking_until: Mutex<Option<Instant>>,
}

impl PacedSpeechEngine {
    const MIN_UTTERANCE: Duration = Duration::from_millis(300);

    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
            speaking_until: Mutex::new(None),
        }
    }

    /// Estimated time to speak `text`
    pub fn utterance_duration(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        let millis = words * 60_000 / self.words_per_minute as u64;
        Duration::from_millis(millis).max(Self::MIN_UTTERANCE)
    }
}

impl Default for PacedSpeechEngine {
    fn default() -> Self {
        Self::new(160)
    }
}

#[async_trait::async_trait]
impl SpeechEngine for PacedSpeechEngine {
    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            bail!("Nothing to speak");
        }

        let duration = self.utterance_duration(text);
        *self.speaking_until.lock().await = Some(Instant::now() + duration);

        info!("Speaking {} words ({:.1}s)", text.split_whitespace().count(), duration.as_secs_f64());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.speaking_until.lock().await = None;
        debug!("Speech halted");
        Ok(())
    }

    async fn is_speaking(&self) -> bool {
        match *self.speaking_until.lock().await {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }
}
