// Playback device abstraction
//
// A player loads a ref into a `Sound`; the sound plays to its natural end and
// must be unloaded by its owner. Playback sessions own at most one sound.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// A loaded playback resource
#[async_trait::async_trait]
pub trait Sound: Send {
    /// Play from the start; resolves when the audio ends naturally
    ///
    /// The future may be dropped mid-way to interrupt playback.
    async fn play(&mut self) -> Result<()>;

    /// Release the underlying resource
    async fn unload(&mut self) -> Result<()>;
}

/// Playback device
#[async_trait::async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Load the audio behind `source` (an opaque ref)
    async fn load(&self, source: &str) -> Result<Box<dyn Sound>>;
}

/// Resolve a `file://` URI or plain path to a filesystem path
pub fn resolve_file_ref(source: &str) -> Result<PathBuf> {
    if let Some(path) = source.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if source.contains("://") {
        bail!("Unsupported audio ref scheme: {}", source);
    }
    Ok(PathBuf::from(source))
}

/// Probe an audio file and return its duration
pub fn probe_duration(path: &Path) -> Result<Duration> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Unrecognized audio format")?;

    let track = probed
        .format
        .default_track()
        .context("Audio file has no playable track")?;
    let params = &track.codec_params;

    let sample_rate = params.sample_rate.context("Audio track has no sample rate")?;
    let n_frames = params.n_frames.context("Audio track has unknown length")?;

    Ok(Duration::from_secs_f64(n_frames as f64 / sample_rate as f64))
}

/// Player for local audio files
///
/// Files are probed with symphonia on load; playback runs against the clock
/// for the probed duration.
#[derive(Debug, Default, Clone)]
pub struct FilePlayer;

impl FilePlayer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AudioPlayer for FilePlayer {
    async fn load(&self, source: &str) -> Result<Box<dyn Sound>> {
        let path = resolve_file_ref(source)?;
        let probe_path = path.clone();
        let duration = tokio::task::spawn_blocking(move || probe_duration(&probe_path))
            .await
            .context("Probe task panicked")??;

        info!("Loaded {} ({:.1}s)", path.display(), duration.as_secs_f64());

        Ok(Box::new(ClockSound {
            path,
            duration,
            loaded: true,
        }))
    }
}

struct ClockSound {
    path: PathBuf,
    duration: Duration,
    loaded: bool,
}

#[async_trait::async_trait]
impl Sound for ClockSound {
    async fn play(&mut self) -> Result<()> {
        if !self.loaded {
            bail!("Sound already unloaded: {}", self.path.display());
        }
        tokio::time::sleep(self.duration).await;
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        self.loaded = false;
        debug!("Unloaded {}", self.path.display());
        Ok(())
    }
}
