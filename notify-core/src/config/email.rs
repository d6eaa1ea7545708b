//! Email provider configuration.

use std::time::Duration;
use url::Url;

/// HTTP email provider the email adapter posts to.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Send endpoint of the provider API.
    pub api_url: Url,
    /// Bearer token.
    pub api_key: String,
    pub from_address: String,
    pub timeout: Duration,
}
