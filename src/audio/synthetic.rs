// Tone generator backend
//
// Emits a quiet 440Hz sine wave in real-time paced frames. Used by the daemon
// when no capture device is configured.

use anyhow::{bail, Result};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

const TONE_HZ: f32 = 440.0;
const AMPLITUDE: f32 = 0.2;

pub struct SyntheticBackend {
    config: AudioBackendConfig,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for SyntheticBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            bail!("Synthetic backend already capturing");
        }

        let (tx, rx) = mpsc::channel(100);
        let capturing = Arc::clone(&self.capturing);
        let config = self.config.clone();
        capturing.store(true, Ordering::SeqCst);

        info!(
            "Synthetic capture started ({}Hz, {} channels)",
            config.target_sample_rate, config.target_channels
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(config.buffer_duration_ms));
            let frame_len = config.samples_per_frame();
            let channels = config.target_channels.max(1) as usize;
            let mut phase: u64 = 0;
            let mut timestamp_ms = 0;

            while capturing.load(Ordering::SeqCst) {
                ticker.tick().await;

                let samples: Vec<i16> = (0..frame_len / channels)
                    .flat_map(|_| {
                        let t = phase as f32 / config.target_sample_rate as f32;
                        phase += 1;
                        let value = ((2.0 * PI * TONE_HZ * t).sin() * AMPLITUDE * i16::MAX as f32) as i16;
                        std::iter::repeat(value).take(channels)
                    })
                    .collect();

                let frame = AudioFrame {
                    samples,
                    sample_rate: config.target_sample_rate,
                    channels: config.target_channels,
                    timestamp_ms,
                };
                timestamp_ms += config.buffer_duration_ms;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Synthetic capture task panicked: {}", e);
            }
        }

        info!("Synthetic capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
