//! Email adapter posting to an HTTP email provider.

use super::{AdapterError, EmailChannel, require_non_empty};
use crate::config::EmailConfig;
use crate::store::ContactDirectory;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

pub struct HttpEmailChannel {
    config: EmailConfig,
    contacts: Arc<dyn ContactDirectory>,
    http_client: reqwest::Client,
}

impl HttpEmailChannel {
    pub fn new(config: EmailConfig, contacts: Arc<dyn ContactDirectory>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            contacts,
            http_client,
        }
    }
}

#[async_trait]
impl EmailChannel for HttpEmailChannel {
    async fn deliver_email(
        &self,
        recipient_id: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), AdapterError> {
        require_non_empty("subject", subject)?;

        let to = self
            .contacts
            .email_address(recipient_id)
            .await?
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| AdapterError::MissingContact(recipient_id.to_owned()))?;

        let response = self
            .http_client
            .post(self.config.api_url.clone())
            .bearer_auth(&self.config.api_key)
            .json(&SendEmailRequest {
                from: &self.config.from_address,
                to: &to,
                subject,
                html: html_body,
                text: text_body,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(recipient_id, status = status.as_u16(), "Email accepted by provider");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AdapterError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
