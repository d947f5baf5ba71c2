use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub capture: CaptureConfig,
    pub speech: SpeechConfig,
    pub permissions: PermissionsConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    /// "synthetic" or "file"
    pub source: String,
    pub file_path: Option<String>,
    pub finalize_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SpeechConfig {
    pub poll_interval_ms: u64,
    pub words_per_minute: u32,
}

#[derive(Debug, Deserialize)]
pub struct PermissionsConfig {
    pub microphone: bool,
    pub media_library: bool,
}

impl Config {
    /// Load from a config file, with `COMPANION__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("COMPANION").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Recordings directory with `~` expanded
    pub fn recordings_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.audio.recordings_path).into_owned())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            recordings_dir: self.recordings_dir(),
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            speech_poll_interval: Duration::from_millis(self.speech.poll_interval_ms),
            finalize_timeout: Duration::from_millis(self.capture.finalize_timeout_ms),
            ..SessionConfig::default()
        }
    }
}
