//! Webhook payload posted to recipient endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::Signature;

/// Body of every notification webhook.
///
/// `notification_id` is the outbox entry id and stays the same across
/// retries, so receivers can deduplicate on it. `payload` is the event
/// payload exactly as the producer sent it (see
/// [`EventPayload`](super::EventPayload) for the known shapes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub notification_id: Uuid,
    pub event_type: String,
    pub entity_id: String,
    pub entity_version: i64,
    pub recipient_id: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

impl Signature for WebhookNotification {}
