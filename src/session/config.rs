use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration shared by the conversation sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory voice notes are written to
    pub recordings_dir: PathBuf,

    /// Sample rate for captured voice notes
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// How often the speech engine is asked whether it is still speaking
    pub speech_poll_interval: Duration,

    /// Upper bound on stopping the capture device and closing the voice note
    pub finalize_timeout: Duration,

    /// Buffered session events per subscriber
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recordings_dir: std::env::temp_dir().join("loqa-companion"),
            sample_rate: 16000,                             // Voice notes are 16kHz
            channels: 1,                                    // Mono
            speech_poll_interval: Duration::from_millis(250),
            finalize_timeout: Duration::from_secs(5),
            event_capacity: 256,
        }
    }
}
