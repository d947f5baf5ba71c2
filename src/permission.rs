//! Device permission requests
//!
//! The coordinator asks the gate before every capture attempt and never
//! assumes that a previous grant is cached.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Device capability guarded by a platform permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Microphone capture
    Microphone,
    /// Camera / photo gallery access
    MediaLibrary,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Microphone => write!(f, "microphone"),
            Capability::MediaLibrary => write!(f, "media library"),
        }
    }
}

/// Outcome of a permission request. `Denied` is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Platform permission prompt
///
/// Implementations may prompt asynchronously; callers see a single answer.
#[async_trait::async_trait]
pub trait PermissionGate: Send + Sync {
    /// Request access to a capability
    async fn request(&self, capability: Capability) -> PermissionStatus;
}

/// Permission gate answering from a fixed policy
///
/// Models a platform that caches grants: the first request for a capability
/// counts as a prompt, later requests are answered from the cache.
pub struct StaticPermissionGate {
    policy: HashMap<Capability, PermissionStatus>,
    answered: Mutex<HashMap<Capability, PermissionStatus>>,
    prompts: AtomicUsize,
}

impl StaticPermissionGate {
    pub fn new(microphone: bool, media_library: bool) -> Self {
        let status = |granted: bool| {
            if granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            }
        };

        let mut policy = HashMap::new();
        policy.insert(Capability::Microphone, status(microphone));
        policy.insert(Capability::MediaLibrary, status(media_library));

        Self {
            policy,
            answered: Mutex::new(HashMap::new()),
            prompts: AtomicUsize::new(0),
        }
    }

    /// Gate granting every capability
    pub fn allow_all() -> Self {
        Self::new(true, true)
    }

    /// Number of times the user was actually prompted
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn request(&self, capability: Capability) -> PermissionStatus {
        let mut answered = self.answered.lock().await;

        if let Some(status) = answered.get(&capability) {
            debug!("Permission for {} answered from cache: {:?}", capability, status);
            return *status;
        }

        self.prompts.fetch_add(1, Ordering::SeqCst);
        let status = self
            .policy
            .get(&capability)
            .copied()
            .unwrap_or(PermissionStatus::Denied);

        info!("Permission prompt for {}: {:?}", capability, status);
        answered.insert(capability, status);
        status
    }
}
