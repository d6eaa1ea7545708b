//! Outbox writer: turns routing decisions into durable, deduplicated work.

use crate::entities::outbox::NewOutboxEntry;
use crate::store::{OutboxStore, StoreError};
use itertools::Itertools;
use notify_sdk::objects::{Channel, NotificationEvent};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

/// Default bound on delivery attempts per entry.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Upper bound for the retry delay, in seconds.
pub const MAX_BACKOFF_SECS: i64 = 300;

const BASE_BACKOFF_SECS: i64 = 10;

/// Deterministic key for one (event version, recipient, channel) triple.
///
/// SHA-256 over the components joined by the ASCII unit separator, encoded
/// as unpadded base64. Any retry of the same event produces the same keys.
pub fn idempotency_key(
    event_type: &str,
    entity_id: &str,
    entity_version: i64,
    recipient_id: &str,
    channel: Channel,
) -> String {
    let material = [
        event_type,
        entity_id,
        &entity_version.to_string(),
        recipient_id,
        channel.as_str(),
    ]
    .join("\u{1f}");
    let digest = ring::digest::digest(&ring::digest::SHA256, material.as_bytes());
    fast32::base64::RFC4648_NOPAD.encode(digest.as_ref())
}

/// Delay before the next attempt, given the attempt count after the
/// failure: `min(300, 2^attempts * 10)` seconds.
pub fn backoff_delay(attempts: i32) -> time::Duration {
    let exponent = attempts.clamp(0, 8) as u32;
    let seconds = (BASE_BACKOFF_SECS << exponent).min(MAX_BACKOFF_SECS);
    time::Duration::seconds(seconds)
}

/// Result of one [`OutboxWriter::create_entries`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub created: u64,
    /// Pairs skipped because their idempotency key already existed.
    pub duplicates: u64,
}

#[derive(Clone)]
pub struct OutboxWriter {
    store: Arc<dyn OutboxStore>,
    max_attempts: i32,
}

impl OutboxWriter {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Persist one PENDING entry per (recipient, channel) pair whose key has
    /// not been seen before, in a single batched write.
    ///
    /// Safe to call repeatedly with the same event. Only a failing store is
    /// an error; duplicates are counted and skipped.
    pub async fn create_entries(
        &self,
        event: &NotificationEvent,
        pairs: &[(String, Channel)],
        now: OffsetDateTime,
    ) -> Result<WriteOutcome, StoreError> {
        if pairs.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let candidates: Vec<(String, &str, Channel)> = pairs
            .iter()
            .map(|(recipient_id, channel)| {
                let key = idempotency_key(
                    &event.event_type,
                    &event.entity_id,
                    event.entity_version,
                    recipient_id,
                    *channel,
                );
                (key, recipient_id.as_str(), *channel)
            })
            .unique_by(|(key, _, _)| key.clone())
            .collect();

        let keys: Vec<String> = candidates.iter().map(|(key, _, _)| key.clone()).collect();
        let existing = self.store.existing_keys(&keys).await?;
        let payload = serde_json::to_string(&event.payload)?;

        let mut entries = Vec::with_capacity(candidates.len());
        for (key, recipient_id, channel) in candidates {
            if existing.contains(&key) {
                debug!(
                    event_type = %event.event_type,
                    entity_id = %event.entity_id,
                    entity_version = event.entity_version,
                    recipient_id,
                    %channel,
                    "Outbox entry already exists, skipping"
                );
                continue;
            }
            entries.push(NewOutboxEntry {
                id: Uuid::now_v7(),
                event_type: event.event_type.clone(),
                entity_id: event.entity_id.clone(),
                entity_version: event.entity_version,
                idempotency_key: key,
                channel: channel.into(),
                recipient_id: recipient_id.to_owned(),
                payload: payload.clone(),
                max_attempts: self.max_attempts,
            });
        }

        let created = if entries.is_empty() {
            0
        } else {
            self.store.insert_entries(entries, now).await?
        };

        Ok(WriteOutcome {
            created,
            duplicates: pairs.len() as u64 - created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OutboxStatus;
    use crate::store::MemoryStore;

    #[test]
    fn test_backoff_delay_calculation() {
        assert_eq!(backoff_delay(0), time::Duration::seconds(10));
        assert_eq!(backoff_delay(1), time::Duration::seconds(20));
        assert_eq!(backoff_delay(2), time::Duration::seconds(40));
        assert_eq!(backoff_delay(3), time::Duration::seconds(80));
        assert_eq!(backoff_delay(4), time::Duration::seconds(160));
        // Capped at 300
        assert_eq!(backoff_delay(5), time::Duration::seconds(300));
        assert_eq!(backoff_delay(40), time::Duration::seconds(300));
        assert_eq!(backoff_delay(-1), time::Duration::seconds(10));
    }

    #[test]
    fn test_idempotency_key_components() {
        let key = idempotency_key("ticket.created", "t1", 1, "alice", Channel::Email);
        assert_eq!(
            key,
            idempotency_key("ticket.created", "t1", 1, "alice", Channel::Email)
        );
        assert_ne!(
            key,
            idempotency_key("ticket.created", "t1", 2, "alice", Channel::Email)
        );
        assert_ne!(
            key,
            idempotency_key("ticket.created", "t1", 1, "alice", Channel::InApp)
        );
        // Component boundaries are not ambiguous.
        assert_ne!(
            idempotency_key("a", "bc", 1, "d", Channel::Email),
            idempotency_key("ab", "c", 1, "d", Channel::Email)
        );
        // 32 bytes of SHA-256, unpadded base64.
        assert_eq!(key.len(), 43);
    }

    #[tokio::test]
    async fn test_create_entries_twice() {
        let store = Arc::new(MemoryStore::new());
        let writer = OutboxWriter::new(store.clone());
        let event = NotificationEvent::new("ticket.created", "t1");
        let pairs = vec![
            ("alice".to_owned(), Channel::InApp),
            ("alice".to_owned(), Channel::Email),
        ];
        let now = OffsetDateTime::now_utc();

        let first = writer.create_entries(&event, &pairs, now).await.unwrap();
        assert_eq!(first, WriteOutcome { created: 2, duplicates: 0 });

        let second = writer.create_entries(&event, &pairs, now).await.unwrap();
        assert_eq!(second, WriteOutcome { created: 0, duplicates: 2 });

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == OutboxStatus::Pending
            && e.attempts == 0
            && e.next_attempt_at == now
            && e.max_attempts == DEFAULT_MAX_ATTEMPTS));
    }

    #[tokio::test]
    async fn test_duplicate_pairs_in_one_call() {
        let store = Arc::new(MemoryStore::new());
        let writer = OutboxWriter::new(store.clone()).with_max_attempts(5);
        let event = NotificationEvent::new("ticket.created", "t1");
        let pairs = vec![
            ("alice".to_owned(), Channel::InApp),
            ("alice".to_owned(), Channel::InApp),
        ];

        let outcome = writer
            .create_entries(&event, &pairs, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome { created: 1, duplicates: 1 });
        assert_eq!(store.entries()[0].max_attempts, 5);
    }
}
