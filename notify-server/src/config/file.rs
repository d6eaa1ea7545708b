//! TOML file configuration structures.
//!
//! These structs directly map to the `notify-config.toml` file format.

use notify_sdk::objects::{Channel, EventType, Role};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub producer: ProducerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub webhook: WebhookConfig,
    pub email: EmailConfig,
    /// Entries that replace or extend the built-in routing table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing: Vec<RoutingEntry>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Business modules sign `POST /events` bodies with this secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of delivery worker tasks.
    #[serde(default = "default_instances")]
    pub instances: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// PROCESSING leases older than this are released back to FAILED.
    #[serde(default = "default_processing_timeout_secs")]
    pub processing_timeout_secs: u64,
    /// Attempt bound stamped on new outbox entries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            instances: default_instances(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            processing_timeout_secs: default_processing_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_instances() -> usize {
    1
}

fn default_batch_size() -> i64 {
    100
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_processing_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> i32 {
    notify_core::outbox::DEFAULT_MAX_ATTEMPTS
}

fn default_timeout_secs() -> u64 {
    30
}

/// Outbound webhook section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// HMAC secret for the `Notify-Signature` header on outbound webhooks.
    pub secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Email provider section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_url: Url,
    pub api_key: String,
    pub from_address: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// One `[[routing]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub event_type: EventType,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}
