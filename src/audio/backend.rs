use anyhow::Result;
use tokio::sync::mpsc;

use super::file::FileBackend;
use super::synthetic::SyntheticBackend;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64)
    }
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz voice notes
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

impl AudioBackendConfig {
    /// Samples per frame across all channels
    pub fn samples_per_frame(&self) -> usize {
        (self.target_sample_rate as u64 * self.buffer_duration_ms / 1000) as usize
            * self.target_channels as usize
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Synthetic: tone generator (demo daemon, no device needed)
/// - File: replays a WAV file (testing/batch processing)
///
/// A backend is reused across recordings: `start` may be called again after `stop`.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. The channel
    /// closes when capture ends.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    ///
    /// An error here means the device went away mid-capture.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend for the given source
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Synthetic => Ok(Box::new(SyntheticBackend::new(config))),
            AudioSource::File(path) => Ok(Box::new(FileBackend::new(path, config)?)),
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Generated tone, paced in real time
    Synthetic,
    /// File input (for testing/batch processing)
    File(String),
}

impl AudioSource {
    /// Parse a configured source name
    pub fn from_config(source: &str, file_path: Option<&str>) -> Result<Self> {
        match source {
            "synthetic" => Ok(AudioSource::Synthetic),
            "file" => match file_path {
                Some(path) => Ok(AudioSource::File(path.to_string())),
                None => anyhow::bail!("capture.source = \"file\" requires capture.file_path"),
            },
            other => anyhow::bail!("Unknown capture source: {}", other),
        }
    }
}
