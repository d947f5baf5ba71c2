use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::backend::AudioFrame;

/// Metadata for a finished voice note
#[derive(Debug, Clone)]
pub struct VoiceNoteMetadata {
    /// File path to the note
    pub file_path: PathBuf,
    /// Timestamp of the first frame
    pub start_ms: u64,
    /// Timestamp of the last frame
    pub end_ms: u64,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Number of samples written
    pub sample_count: usize,
}

impl VoiceNoteMetadata {
    /// `file://` URI used as the voice ref
    pub fn uri(&self) -> String {
        format!("file://{}", self.file_path.display())
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.sample_count as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Writes a single voice note to disk as a WAV file
///
/// The WAV header is created lazily from the first frame's format, so a note
/// that never receives audio leaves no file behind.
pub struct VoiceNoteWriter {
    file_path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    metadata: Option<VoiceNoteMetadata>,
}

impl VoiceNoteWriter {
    pub fn new(output_dir: &Path, note_id: &str) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .context("Failed to create recordings directory")?;

        Ok(Self {
            file_path: output_dir.join(format!("voice-{}.wav", note_id)),
            writer: None,
            metadata: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if self.writer.is_none() {
            let spec = hound::WavSpec {
                channels: frame.channels,
                sample_rate: frame.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };

            let writer = hound::WavWriter::create(&self.file_path, spec)
                .with_context(|| format!("Failed to create WAV file: {:?}", self.file_path))?;

            self.writer = Some(writer);
            self.metadata = Some(VoiceNoteMetadata {
                file_path: self.file_path.clone(),
                start_ms: frame.timestamp_ms,
                end_ms: frame.timestamp_ms,
                sample_rate: frame.sample_rate,
                channels: frame.channels,
                sample_count: 0,
            });
        }

        if let (Some(writer), Some(metadata)) = (&mut self.writer, &mut self.metadata) {
            if frame.sample_rate != metadata.sample_rate || frame.channels != metadata.channels {
                bail!(
                    "Frame format changed mid-recording: {}Hz/{}ch -> {}Hz/{}ch",
                    metadata.sample_rate,
                    metadata.channels,
                    frame.sample_rate,
                    frame.channels
                );
            }

            for &sample in &frame.samples {
                writer.write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            metadata.end_ms = frame.timestamp_ms;
            metadata.sample_count += frame.samples.len();
        }

        Ok(())
    }

    /// Finalize the WAV header and return the note's metadata
    pub fn finish(mut self) -> Result<VoiceNoteMetadata> {
        let writer = self.writer.take();
        let metadata = self.metadata.take();

        match (writer, metadata) {
            (Some(writer), Some(metadata)) if metadata.sample_count > 0 => {
                writer.finalize()
                    .context("Failed to finalize WAV file")?;

                info!(
                    "Voice note complete: {:?} ({:.1}s, {} samples)",
                    metadata.file_path,
                    metadata.duration_seconds(),
                    metadata.sample_count
                );

                Ok(metadata)
            }
            (writer, _) => {
                if let Some(writer) = writer {
                    writer.finalize().ok();
                    fs::remove_file(&self.file_path).ok();
                }
                bail!("No audio captured")
            }
        }
    }
}

impl Drop for VoiceNoteWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
