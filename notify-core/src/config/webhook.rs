//! Outbound webhook configuration.

use std::time::Duration;

/// Settings for signing and posting webhook notifications.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Secret key bytes for HMAC signing.
    pub secret: Box<[u8]>,
    pub timeout: Duration,
}

impl WebhookConfig {
    pub fn new(secret: impl Into<Box<[u8]>>, timeout: Duration) -> Self {
        Self {
            secret: secret.into(),
            timeout,
        }
    }

    /// Get the secret key bytes for HMAC signing.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
