//! Webhook adapter: posts signed notification bodies to recipient endpoints.

use super::{AdapterError, SignedPayload, WebhookChannel};
use async_trait::async_trait;
use notify_sdk::signature::SIGNATURE_HEADER;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct HttpWebhookChannel {
    http_client: reqwest::Client,
}

impl HttpWebhookChannel {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl WebhookChannel for HttpWebhookChannel {
    async fn deliver_webhook(
        &self,
        endpoint: &Url,
        payload: &SignedPayload,
    ) -> Result<(), AdapterError> {
        let response = self
            .http_client
            .post(endpoint.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, &payload.signature)
            .body(payload.body.clone())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %endpoint, status = status.as_u16(), "Webhook accepted");
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
