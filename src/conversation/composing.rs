use serde::Serialize;

use super::log::ConversationLog;
use super::message::{MediaRef, Message, Sender};
use crate::error::Result;

/// Draft of the next outgoing user message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposingMessage {
    text: String,
    image_ref: Option<MediaRef>,
    voice_ref: Option<MediaRef>,
}

impl ComposingMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Attach an image, replacing any previous one
    pub fn attach_image(&mut self, image_ref: MediaRef) {
        self.image_ref = Some(image_ref);
    }

    /// Attach a voice note, replacing any previous one
    pub fn attach_voice(&mut self, voice_ref: MediaRef) {
        self.voice_ref = Some(voice_ref);
    }

    pub fn detach_image(&mut self) -> Option<MediaRef> {
        self.image_ref.take()
    }

    pub fn detach_voice(&mut self) -> Option<MediaRef> {
        self.voice_ref.take()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image_ref(&self) -> Option<&MediaRef> {
        self.image_ref.as_ref()
    }

    pub fn voice_ref(&self) -> Option<&MediaRef> {
        self.voice_ref.as_ref()
    }

    /// True when there is nothing sendable (blank text counts as nothing)
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image_ref.is_none() && self.voice_ref.is_none()
    }

    /// Flush the draft into `log` as a user message
    ///
    /// Validation, append and clear happen while the caller holds `&mut self`,
    /// so no half-sent draft is observable. On `Empty` nothing changes.
    pub async fn try_send(&mut self, log: &ConversationLog) -> Result<Message> {
        let message = Message::new(
            Sender::User,
            Some(self.text.trim().to_string()),
            self.image_ref.clone(),
            self.voice_ref.clone(),
        )?;

        log.append(message.clone()).await;
        self.clear();

        Ok(message)
    }
}
