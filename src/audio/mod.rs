pub mod backend;
pub mod file;
pub mod player;
pub mod synthetic;
pub mod wav;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::{AudioFile, FileBackend};
pub use player::{AudioPlayer, FilePlayer, Sound};
pub use synthetic::SyntheticBackend;
pub use wav::{VoiceNoteMetadata, VoiceNoteWriter};
