//! Conversation data: finalized messages, the append-only log, and the
//! draft being composed.

mod composing;
mod log;
mod message;

pub use composing::ComposingMessage;
pub use log::ConversationLog;
pub use message::{MediaRef, Message, Sender};
