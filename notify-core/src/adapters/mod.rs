//! Channel adapters: the transports behind each delivery channel.
//!
//! The delivery worker only depends on the three capability traits below.
//! Every adapter answers with `Ok(())` or an [`AdapterError`]; the worker
//! turns either into an outbox state transition.

pub mod email;
pub mod in_app;
pub mod templates;
pub mod webhook;

pub use email::HttpEmailChannel;
pub use in_app::{MemoryInAppChannel, PgInAppChannel};
pub use templates::{EmailContent, InAppContent, TemplateRenderer};
pub use webhook::HttpWebhookChannel;

use crate::store::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while delivering through a channel.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote end answered with a non-2xx status
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The delivery did not finish within the worker's dispatch deadline
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),

    /// Webhook delivery without a configured endpoint
    #[error("no webhook endpoint configured for recipient {0}")]
    MissingEndpoint(String),

    /// No email address on file
    #[error("no email address on file for recipient {0}")]
    MissingContact(String),

    /// The adapter was called with arguments that break its contract.
    /// Indicates a bug, not an environment condition.
    #[error("adapter contract violated: {0}")]
    Contract(String),

    /// Stored payload could not be decoded or encoded
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Template rendering error
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AdapterError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AdapterError::Contract(_))
    }
}

/// A webhook body together with the value of its signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// JSON body, sent byte-for-byte as signed.
    pub body: String,
    /// `Notify-Signature` header value.
    pub signature: String,
}

#[async_trait]
pub trait InAppChannel: Send + Sync {
    async fn deliver_in_app(
        &self,
        recipient_id: &str,
        title: &str,
        message: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn deliver_email(
        &self,
        recipient_id: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait WebhookChannel: Send + Sync {
    async fn deliver_webhook(
        &self,
        endpoint: &Url,
        payload: &SignedPayload,
    ) -> Result<(), AdapterError>;
}

/// One adapter per channel, shared by every worker instance.
#[derive(Clone)]
pub struct ChannelAdapters {
    pub in_app: Arc<dyn InAppChannel>,
    pub email: Arc<dyn EmailChannel>,
    pub webhook: Arc<dyn WebhookChannel>,
}

/// Fail fast on empty arguments the adapters cannot do anything with.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), AdapterError> {
    if value.trim().is_empty() {
        return Err(AdapterError::Contract(format!("{field} must not be empty")));
    }
    Ok(())
}
