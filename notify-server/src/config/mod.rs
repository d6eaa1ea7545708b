//! Configuration module for notify-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::{FileConfig, RoutingEntry};
use crate::config::runtime::{
    AdminConfig, ProducerConfig, RuntimeConfig, ServerConfig, WorkerPoolConfig,
};
use notify_core::config::{EmailConfig, WebhookConfig, WorkerConfig};
use notify_core::routing::{RoutingRule, RoutingTable};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Validate the configuration
    /// 3. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 4. Apply CLI overrides
    /// 5. Build the routing table and the runtime configuration
    pub fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        self.validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = self.hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        Ok(build_runtime_config(file_config, secret_hash))
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.admin.secret.is_empty() {
            return invalid("admin secret must not be empty".to_owned());
        }
        if config.producer.secret.is_empty() {
            return invalid("producer secret must not be empty".to_owned());
        }
        if config.webhook.secret.is_empty() {
            return invalid("webhook secret must not be empty".to_owned());
        }
        if config.worker.instances < 1 {
            return invalid("worker.instances must be at least 1".to_owned());
        }
        if config.worker.batch_size < 1 {
            return invalid("worker.batch_size must be at least 1".to_owned());
        }
        if config.worker.max_attempts < 1 {
            return invalid("worker.max_attempts must be at least 1".to_owned());
        }
        if config.worker.poll_interval_secs == 0 {
            return invalid("worker.poll_interval_secs must be at least 1".to_owned());
        }
        // A dispatch is cut off at half the processing timeout; adapters
        // must give up before that.
        let adapter_timeout = config.webhook.timeout_secs.max(config.email.timeout_secs);
        if config.worker.processing_timeout_secs <= adapter_timeout.saturating_mul(2) {
            return invalid(format!(
                "worker.processing_timeout_secs must be more than twice the longest adapter timeout ({adapter_timeout}s)"
            ));
        }
        for entry in &config.routing {
            if entry.roles.is_empty() {
                return invalid(format!(
                    "routing entry for {} has no roles",
                    entry.event_type
                ));
            }
        }
        Ok(())
    }

    fn hash_secret(&self, plaintext: &str) -> Result<String, ConfigError> {
        use argon2::{
            Argon2, PasswordHasher,
            password_hash::{SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ConfigError::HashError(e.to_string()))
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn build_runtime_config(file_config: FileConfig, secret_hash: String) -> RuntimeConfig {
    let worker = file_config.worker;
    RuntimeConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        admin: AdminConfig::new(secret_hash),
        producer: ProducerConfig::new(file_config.producer.secret.into_bytes()),
        workers: WorkerPoolConfig {
            instances: worker.instances,
            max_attempts: worker.max_attempts,
            worker: WorkerConfig {
                batch_size: worker.batch_size,
                poll_interval: Duration::from_secs(worker.poll_interval_secs),
                processing_timeout: Duration::from_secs(worker.processing_timeout_secs),
            },
        },
        webhook: WebhookConfig::new(
            file_config.webhook.secret.into_bytes(),
            Duration::from_secs(file_config.webhook.timeout_secs),
        ),
        email: EmailConfig {
            api_url: file_config.email.api_url,
            api_key: file_config.email.api_key,
            from_address: file_config.email.from_address,
            timeout: Duration::from_secs(file_config.email.timeout_secs),
        },
        routing: Arc::new(build_routing_table(file_config.routing)),
    }
}

fn invalid(msg: String) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(msg))
}

/// Built-in rules, with each configured entry replacing or adding the rule
/// for its event type.
pub fn build_routing_table(entries: Vec<RoutingEntry>) -> RoutingTable {
    RoutingTable::builtin().with_rules(
        entries
            .into_iter()
            .map(|entry| (entry.event_type, RoutingRule::new(entry.roles, entry.channels))),
    )
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::tests::SAMPLE;
    use notify_sdk::objects::{Channel, EventType, Role};
    use std::path::PathBuf;

    struct TempConfig(PathBuf);

    impl TempConfig {
        fn new(content: &str) -> Self {
            let path = std::env::temp_dir().join(format!("notify-config-{}.toml", uuid::Uuid::new_v4()));
            std::fs::write(&path, content).unwrap();
            Self(path)
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_load_hashes_plaintext_secret() {
        let file = TempConfig::new(SAMPLE);
        let loader = ConfigLoader::new(&file.0, None);

        let config = loader.load().unwrap();
        assert!(config.admin.verify_secret("test-secret"));
        assert_eq!(config.producer.secret_bytes(), b"producer-secret");
        assert_eq!(config.workers.instances, 2);
        assert_eq!(config.workers.worker.batch_size, 50);
        assert_eq!(config.workers.worker.poll_interval, Duration::from_secs(5));

        let rewritten = std::fs::read_to_string(&file.0).unwrap();
        assert!(rewritten.contains("$argon2"));
        assert!(!rewritten.contains("test-secret"));

        // Second load reuses the stored hash.
        let again = loader.load().unwrap();
        assert_eq!(again.admin.secret_hash, config.admin.secret_hash);
    }

    #[test]
    fn test_listen_override_is_not_persisted() {
        let file = TempConfig::new(SAMPLE);
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();

        let config = ConfigLoader::new(&file.0, Some(listen)).load().unwrap();
        assert_eq!(config.server.listen, listen);

        let rewritten: FileConfig =
            toml::from_str(&std::fs::read_to_string(&file.0).unwrap()).unwrap();
        assert_eq!(rewritten.server.listen.port(), 3000);
    }

    #[test]
    fn test_routing_entries_override_builtin_rules() {
        let file = TempConfig::new(SAMPLE);
        let config = ConfigLoader::new(&file.0, None).load().unwrap();

        let rule = config.routing.get(EventType::TicketCreated).unwrap();
        assert_eq!(rule.allowed_roles.iter().copied().collect::<Vec<_>>(), vec![Role::Landlord]);
        assert_eq!(rule.default_channels.as_slice(), &[Channel::InApp]);
        assert_eq!(config.routing.len(), RoutingTable::builtin().len());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for (from, to) in [
            ("instances = 2", "instances = 0"),
            ("batch_size = 50", "batch_size = 0"),
            ("roles = [\"landlord\"]", "roles = []"),
            ("secret = \"webhook-secret\"", "secret = \"\""),
        ] {
            let file = TempConfig::new(&SAMPLE.replace(from, to));
            let result = ConfigLoader::new(&file.0, None).load();
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "{to} should be rejected"
            );
        }
    }

    #[test]
    fn test_processing_timeout_must_outlast_adapters() {
        let with_timeout =
            |secs: u64| SAMPLE.replace("batch_size = 50", &format!("batch_size = 50\nprocessing_timeout_secs = {secs}"));

        let file = TempConfig::new(&with_timeout(60));
        let result = ConfigLoader::new(&file.0, None).load();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let file = TempConfig::new(&with_timeout(61));
        let config = ConfigLoader::new(&file.0, None).load().unwrap();
        assert_eq!(config.workers.worker.processing_timeout.as_secs(), 61);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new("/nonexistent/notify-config.toml", None).load();
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
