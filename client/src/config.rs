//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Heartbeat period floor in milliseconds.
pub const MIN_HEART_BEAT_MS: u64 = 1_000;
/// Heartbeat period ceiling in milliseconds.
pub const MAX_HEART_BEAT_MS: u64 = 600_000;
/// Default heartbeat period in milliseconds.
pub const DEFAULT_HEART_BEAT_MS: u64 = 30_000;

/// Identity credentials for secured mode.
///
/// Presence of both the name and the secret selects secured mode; the secret
/// is only ever used to derive proofs and never leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Identity name presented to the host.
    pub identity: String,
    /// Identity secret proved to the host.
    pub secret: String,
}

impl Credentials {
    /// Create credentials from an identity name and secret.
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

/// Configuration for a message-wire client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint connection string, e.g. `tcp://127.0.0.1:5700`.
    pub endpoint: String,
    /// Optional credentials; `None` selects plaintext mode.
    pub credentials: Option<Credentials>,
    /// Heartbeat period in milliseconds, clamped to
    /// [[`MIN_HEART_BEAT_MS`], [`MAX_HEART_BEAT_MS`]].
    pub heart_beat_ms: u64,
}

impl ClientConfig {
    /// Configuration for a plaintext client talking to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
            heart_beat_ms: DEFAULT_HEART_BEAT_MS,
        }
    }

    /// Select secured mode with the given credentials.
    pub fn with_credentials(
        mut self,
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(identity, secret));
        self
    }

    /// Override the heartbeat period.
    pub fn with_heart_beat_ms(mut self, heart_beat_ms: u64) -> Self {
        self.heart_beat_ms = heart_beat_ms;
        self
    }

    /// Effective heartbeat period after clamping.
    pub fn heart_beat(&self) -> Duration {
        Duration::from_millis(self.heart_beat_ms.clamp(MIN_HEART_BEAT_MS, MAX_HEART_BEAT_MS))
    }

    /// Whether this configuration selects secured mode.
    pub fn secured(&self) -> bool {
        self.credentials.is_some()
    }
}
