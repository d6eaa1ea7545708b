//! In-process implementation of the store traits.
//!
//! All state sits behind one mutex, which makes `claim_due` atomic in the
//! same way the Postgres claim statement is. Nothing is awaited while the
//! lock is held.

use super::{ContactDirectory, MembershipDirectory, OutboxStore, PreferenceStore, StoreError};
use crate::entities::OutboxStatus;
use crate::entities::outbox::{NewOutboxEntry, OutboxEntry};
use async_trait::async_trait;
use notify_sdk::objects::{PreferenceUpdate, RecipientPreference, Role};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    outbox: Vec<OutboxEntry>,
    preferences: HashMap<String, RecipientPreference>,
    memberships: HashMap<(String, Role), Vec<String>>,
    emails: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `user_id` as holding `role` in `org_id`.
    pub fn add_member(&self, org_id: &str, user_id: &str, role: Role) {
        let mut state = self.lock();
        let members = state
            .memberships
            .entry((org_id.to_owned(), role))
            .or_default();
        if !members.iter().any(|m| m == user_id) {
            members.push(user_id.to_owned());
        }
    }

    pub fn set_email(&self, recipient_id: &str, email: &str) {
        self.lock()
            .emails
            .insert(recipient_id.to_owned(), email.to_owned());
    }

    pub fn set_preferences(&self, recipient_id: &str, preference: RecipientPreference) {
        self.lock()
            .preferences
            .insert(recipient_id.to_owned(), preference);
    }

    /// Snapshot of every outbox entry, in insertion order.
    pub fn entries(&self) -> Vec<OutboxEntry> {
        self.lock().outbox.clone()
    }

    /// Overwrite a stored entry. Lets tests simulate a crashed worker.
    pub fn replace_entry(&self, entry: OutboxEntry) {
        let mut state = self.lock();
        if let Some(slot) = state.outbox.iter_mut().find(|e| e.id == entry.id) {
            *slot = entry;
        }
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError> {
        let state = self.lock();
        Ok(state
            .outbox
            .iter()
            .filter(|e| keys.contains(&e.idempotency_key))
            .map(|e| e.idempotency_key.clone())
            .collect())
    }

    async fn insert_entries(
        &self,
        entries: Vec<NewOutboxEntry>,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut inserted = 0;
        for entry in entries {
            if state
                .outbox
                .iter()
                .any(|e| e.idempotency_key == entry.idempotency_key)
            {
                continue;
            }
            state.outbox.push(OutboxEntry::pending(entry, now));
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn release_stale(
        &self,
        stale_before: OffsetDateTime,
        now: OffsetDateTime,
        reason: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut released = 0;
        for entry in state.outbox.iter_mut().filter(|e| {
            e.status == OutboxStatus::Processing
                && e.last_attempt_at.is_some_and(|t| t < stale_before)
        }) {
            entry.status = OutboxStatus::Failed;
            entry.last_error = Some(reason.to_owned());
            entry.next_attempt_at = now;
            released += 1;
        }
        Ok(released)
    }

    async fn claim_due(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<OutboxEntry>, StoreError> {
        let mut state = self.lock();
        let mut due: Vec<usize> = state
            .outbox
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                matches!(e.status, OutboxStatus::Pending | OutboxStatus::Failed)
                    && e.next_attempt_at <= now
                    && e.attempts < e.max_attempts
            })
            .map(|(i, _)| i)
            .collect();
        due.sort_by_key(|&i| state.outbox[i].next_attempt_at);
        due.truncate(usize::try_from(limit).unwrap_or(0));

        let mut claimed = Vec::with_capacity(due.len());
        for i in due {
            let entry = &mut state.outbox[i];
            entry.status = OutboxStatus::Processing;
            entry.attempts += 1;
            entry.last_attempt_at = Some(now);
            claimed.push(entry.clone());
        }
        Ok(claimed)
    }

    async fn renew_lease(
        &self,
        id: Uuid,
        attempts: i32,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(entry) = state.outbox.iter_mut().find(|e| {
            e.id == id && e.attempts == attempts && e.status == OutboxStatus::Processing
        }) else {
            return Ok(false);
        };
        entry.last_attempt_at = Some(now);
        Ok(true)
    }

    async fn release_claims(&self, claims: &[(Uuid, i32)]) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut released = 0;
        for entry in state.outbox.iter_mut().filter(|e| {
            e.status == OutboxStatus::Processing
                && claims.contains(&(e.id, e.attempts))
        }) {
            entry.attempts -= 1;
            entry.status = if entry.attempts == 0 {
                OutboxStatus::Pending
            } else {
                OutboxStatus::Failed
            };
            released += 1;
        }
        Ok(released)
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        attempts: i32,
        delivered_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(entry) = state.outbox.iter_mut().find(|e| {
            e.id == id && e.attempts == attempts && e.status == OutboxStatus::Processing
        }) else {
            return Ok(false);
        };
        entry.status = OutboxStatus::Delivered;
        entry.delivered_at = Some(delivered_at);
        entry.last_error = None;
        Ok(true)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: i32,
        error: &str,
        next_attempt_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(entry) = state.outbox.iter_mut().find(|e| {
            e.id == id && e.attempts == attempts && e.status == OutboxStatus::Processing
        }) else {
            return Ok(false);
        };
        entry.status = OutboxStatus::Failed;
        entry.last_error = Some(error.to_owned());
        entry.next_attempt_at = next_attempt_at;
        Ok(true)
    }

    async fn get_entry(&self, id: Uuid) -> Result<Option<OutboxEntry>, StoreError> {
        Ok(self.lock().outbox.iter().find(|e| e.id == id).cloned())
    }

    async fn list_exhausted(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        let state = self.lock();
        let mut exhausted: Vec<OutboxEntry> = state
            .outbox
            .iter()
            .filter(|e| e.is_exhausted())
            .cloned()
            .collect();
        exhausted.sort_by(|a, b| b.last_attempt_at.cmp(&a.last_attempt_at));
        exhausted.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(exhausted)
    }

    async fn requeue(&self, id: Uuid, now: OffsetDateTime) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(entry) = state
            .outbox
            .iter_mut()
            .find(|e| e.id == id && e.is_exhausted())
        else {
            return Ok(false);
        };
        entry.status = OutboxStatus::Pending;
        entry.attempts = 0;
        entry.next_attempt_at = now;
        entry.last_error = None;
        Ok(true)
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get_preferences(&self, recipient_id: &str) -> Result<RecipientPreference, StoreError> {
        Ok(self
            .lock()
            .preferences
            .entry(recipient_id.to_owned())
            .or_default()
            .clone())
    }

    async fn update_preferences(
        &self,
        recipient_id: &str,
        update: PreferenceUpdate,
    ) -> Result<RecipientPreference, StoreError> {
        let mut state = self.lock();
        let preference = state
            .preferences
            .entry(recipient_id.to_owned())
            .or_default();
        preference.apply(update);
        Ok(preference.clone())
    }
}

#[async_trait]
impl MembershipDirectory for MemoryStore {
    async fn members_with_role(&self, org_id: &str, role: Role) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .memberships
            .get(&(org_id.to_owned(), role))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContactDirectory for MemoryStore {
    async fn email_address(&self, recipient_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().emails.get(recipient_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DeliveryChannel;

    fn new_entry(key: &str) -> NewOutboxEntry {
        NewOutboxEntry {
            id: Uuid::now_v7(),
            event_type: "ticket.created".to_owned(),
            entity_id: "t1".to_owned(),
            entity_version: 1,
            idempotency_key: key.to_owned(),
            channel: DeliveryChannel::Email,
            recipient_id: "u1".to_owned(),
            payload: "{\"kind\":\"empty\"}".to_owned(),
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn test_insert_skips_existing_keys() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        assert_eq!(store.insert_entries(vec![new_entry("a")], now).await.unwrap(), 1);
        assert_eq!(
            store
                .insert_entries(vec![new_entry("a"), new_entry("b")], now)
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        store
            .insert_entries(vec![new_entry("a"), new_entry("b")], now)
            .await
            .unwrap();

        let first = store.claim_due(now, 10).await.unwrap();
        let second = store.claim_due(now, 10).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert!(first.iter().all(|e| e.attempts == 1));
    }

    #[tokio::test]
    async fn test_stale_claim_cannot_complete() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        store.insert_entries(vec![new_entry("a")], now).await.unwrap();
        let claimed = store.claim_due(now, 1).await.unwrap().remove(0);

        assert!(!store.mark_delivered(claimed.id, 0, now).await.unwrap());
        assert!(store.mark_delivered(claimed.id, 1, now).await.unwrap());
        assert!(!store.mark_failed(claimed.id, 1, "late", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_requires_held_claim() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        store.insert_entries(vec![new_entry("a")], now).await.unwrap();
        let claimed = store.claim_due(now, 1).await.unwrap().remove(0);

        let later = now + time::Duration::seconds(90);
        assert!(store.renew_lease(claimed.id, 1, later).await.unwrap());
        assert_eq!(store.entries()[0].last_attempt_at, Some(later));

        // A renewed lease is not stale yet.
        let released = store
            .release_stale(now + time::Duration::seconds(60), later, "expired")
            .await
            .unwrap();
        assert_eq!(released, 0);

        store.mark_delivered(claimed.id, 1, later).await.unwrap();
        assert!(!store.renew_lease(claimed.id, 1, later).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_claims_gives_attempt_back() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        store
            .insert_entries(vec![new_entry("a"), new_entry("b")], now)
            .await
            .unwrap();
        let claimed = store.claim_due(now, 10).await.unwrap();
        let first = &claimed[0];
        store.mark_failed(first.id, 1, "boom", now).await.unwrap();
        let first = store.claim_due(now, 10).await.unwrap().remove(0);
        assert_eq!(first.attempts, 2);

        let claims: Vec<_> = store
            .entries()
            .iter()
            .map(|e| (e.id, e.attempts))
            .collect();
        assert_eq!(store.release_claims(&claims).await.unwrap(), 2);

        for entry in store.entries() {
            if entry.id == first.id {
                assert_eq!(entry.status, OutboxStatus::Failed);
                assert_eq!(entry.attempts, 1);
                assert_eq!(entry.last_error.as_deref(), Some("boom"));
            } else {
                assert_eq!(entry.status, OutboxStatus::Pending);
                assert_eq!(entry.attempts, 0);
            }
        }
        // Already released.
        assert_eq!(store.release_claims(&claims).await.unwrap(), 0);
        assert_eq!(store.claim_due(now, 10).await.unwrap().len(), 2);
    }
}
