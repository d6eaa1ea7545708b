//! Webhook signature verification helper.
//!
//! Convenience wrapper around [`SignedObject`] for endpoints receiving
//! notification webhooks.

use crate::objects::WebhookNotification;
use crate::signature::{SignatureError, SignedObject};

/// Verify and deserialize an incoming notification webhook.
///
/// * `signature_header` – value of the `Notify-Signature` request header.
/// * `body` – raw JSON request body string.
/// * `secret` – the webhook HMAC secret shared with the notification service.
///
/// # Example
///
/// ```ignore
/// use notify_sdk::webhook::verify_webhook;
///
/// let notification = verify_webhook(signature_header, &body, webhook_secret)?;
/// ```
pub fn verify_webhook(
    signature_header: &str,
    body: &str,
    secret: &[u8],
) -> Result<WebhookNotification, SignatureError> {
    SignedObject::<WebhookNotification>::from_header_and_body(signature_header, body.to_owned())?
        .verify(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SECRET: &[u8] = b"webhook-secret";

    fn notification() -> WebhookNotification {
        WebhookNotification {
            notification_id: Uuid::new_v4(),
            event_type: "invoice.paid".to_owned(),
            entity_id: "inv-1".to_owned(),
            entity_version: 2,
            recipient_id: "alice".to_owned(),
            payload: serde_json::json!({"kind": "invoice", "number": "INV-1"}),
            timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    #[test]
    fn test_verify_webhook() {
        let sent = notification();
        let signed = SignedObject::new(sent.clone(), SECRET).unwrap();
        let received = verify_webhook(&signed.to_header(), &signed.json, SECRET).unwrap();
        assert_eq!(received, sent);
    }

    #[test]
    fn test_stale_signature_rejected() {
        let stale = time::OffsetDateTime::now_utc().unix_timestamp() - 3600;
        let signed = SignedObject::new_at(notification(), SECRET, stale).unwrap();
        assert!(matches!(
            verify_webhook(&signed.to_header(), &signed.json, SECRET),
            Err(SignatureError::Expired)
        ));
    }
}
