use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, SessionError};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// Opaque reference to stored media (URI or content handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MediaRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A finalized conversation message
///
/// Always carries at least one of text, image or voice. Fields are read-only
/// once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: Uuid,
    sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_ref: Option<MediaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_ref: Option<MediaRef>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Build a message stamped with a fresh time-ordered id and the current time
    ///
    /// Text is stored as given and an empty string counts as absent; fails
    /// with `Empty` if no content remains.
    pub fn new(
        sender: Sender,
        text: Option<String>,
        image_ref: Option<MediaRef>,
        voice_ref: Option<MediaRef>,
    ) -> Result<Self> {
        let text = text.filter(|t| !t.is_empty());

        if text.is_none() && image_ref.is_none() && voice_ref.is_none() {
            return Err(SessionError::Empty);
        }

        Ok(Self {
            id: Uuid::now_v7(),
            sender,
            text,
            image_ref,
            voice_ref,
            created_at: Utc::now(),
        })
    }

    /// Text-only message
    pub fn text(sender: Sender, text: impl Into<String>) -> Result<Self> {
        Self::new(sender, Some(text.into()), None, None)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn image_ref(&self) -> Option<&MediaRef> {
        self.image_ref.as_ref()
    }

    pub fn voice_ref(&self) -> Option<&MediaRef> {
        self.voice_ref.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
