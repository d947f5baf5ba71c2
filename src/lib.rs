pub mod audio;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod http;
pub mod permission;
pub mod session;
pub mod speech;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioPlayer,
    AudioSource, FilePlayer, Sound, VoiceNoteWriter,
};
pub use config::Config;
pub use conversation::{ComposingMessage, ConversationLog, MediaRef, Message, Sender};
pub use coordinator::{CoordinatorStatus, Devices, SessionCoordinator};
pub use error::SessionError;
pub use events::{EventSink, SessionEvent};
pub use http::{create_router, AppState};
pub use permission::{Capability, PermissionGate, PermissionStatus, StaticPermissionGate};
pub use session::{
    Channel, PlayOutcome, PlaybackSession, PlaybackStatus, RecordingSession, RecordingStatus,
    SessionConfig, SessionHandle, SpeakOutcome, SpeechSession, SpeechStatus, StopOutcome,
    Utterance,
};
pub use speech::{PacedSpeechEngine, SpeechEngine};
