use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::message::Message;

/// Append-only, shared conversation history
///
/// Cloning yields another handle to the same log.
#[derive(Clone, Default)]
pub struct ConversationLog {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, message: Message) {
        self.messages.write().await.push(message);
    }

    /// Messages oldest first
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<Message> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}
