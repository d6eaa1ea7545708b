//! Validated runtime configuration.
//!
//! Built once from [`FileConfig`](super::file::FileConfig) at startup and
//! shared read-only behind an `Arc`.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use notify_core::config::{EmailConfig, WebhookConfig, WorkerConfig};
use notify_core::routing::RoutingTable;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Admin configuration with hashed secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// The argon2 hashed admin secret.
    pub secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Verify a plaintext secret against the stored hash.
    pub fn verify_secret(&self, plaintext: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Secret shared with the business modules that post events.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    secret: Box<[u8]>,
}

impl ProducerConfig {
    pub fn new(secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// Delivery worker pool settings.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub instances: usize,
    pub max_attempts: i32,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub producer: ProducerConfig,
    pub workers: WorkerPoolConfig,
    pub webhook: WebhookConfig,
    pub email: EmailConfig,
    pub routing: Arc<RoutingTable>,
}
