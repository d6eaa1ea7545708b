//! Storage seams of the notification engine.
//!
//! The engine only talks to these traits:
//!
//! - `OutboxStore`: durable work items, deduplicated by idempotency key
//! - `PreferenceStore`: per-recipient channel preferences
//! - `MembershipDirectory`: who holds which role in an organization
//! - `ContactDirectory`: how to reach a recipient by email
//!
//! `PgStore` implements all four on Postgres; `MemoryStore` implements them
//! in process for tests and single-node development.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::entities::outbox::{NewOutboxEntry, OutboxEntry};
use async_trait::async_trait;
use notify_sdk::objects::{PreferenceUpdate, RecipientPreference, Role};
use std::collections::HashSet;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors raised by a store implementation.
///
/// These are infrastructure failures; expected conditions such as a
/// duplicate idempotency key are never reported as errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// The subset of `keys` that already have an outbox entry.
    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError>;

    /// Persist `entries` in one batch as PENDING, due at `now`.
    ///
    /// An entry whose idempotency key already exists is skipped silently.
    /// Returns how many entries were actually written.
    async fn insert_entries(
        &self,
        entries: Vec<NewOutboxEntry>,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError>;

    /// Move PROCESSING entries whose attempt started before `stale_before`
    /// to FAILED, due at `now`, with `reason` as the last error.
    async fn release_stale(
        &self,
        stale_before: OffsetDateTime,
        now: OffsetDateTime,
        reason: &str,
    ) -> Result<u64, StoreError>;

    /// Atomically claim up to `limit` due entries and mark them PROCESSING.
    ///
    /// Returned entries already carry the incremented `attempts`; that
    /// value is the claim token for [`mark_delivered`](Self::mark_delivered)
    /// and [`mark_failed`](Self::mark_failed).
    async fn claim_due(&self, now: OffsetDateTime, limit: i64)
    -> Result<Vec<OutboxEntry>, StoreError>;

    /// Restart the lease of a claimed entry at `now`, right before it is
    /// dispatched. Returns `false` if the claim was lost.
    async fn renew_lease(
        &self,
        id: Uuid,
        attempts: i32,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Hand back claims that were never dispatched. Each entry returns to
    /// the due state it was claimed from, without the attempt the claim
    /// counted. Claims no longer held are skipped.
    async fn release_claims(&self, claims: &[(Uuid, i32)]) -> Result<u64, StoreError>;

    /// Returns `false` if the claim was lost (entry no longer PROCESSING at
    /// that attempt number).
    async fn mark_delivered(
        &self,
        id: Uuid,
        attempts: i32,
        delivered_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Returns `false` if the claim was lost.
    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: i32,
        error: &str,
        next_attempt_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    async fn get_entry(&self, id: Uuid) -> Result<Option<OutboxEntry>, StoreError>;

    /// FAILED entries with no attempts left.
    async fn list_exhausted(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError>;

    /// Reset an exhausted entry to PENDING with zero attempts.
    /// Returns `false` if the entry is missing or not exhausted.
    async fn requeue(&self, id: Uuid, now: OffsetDateTime) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Never fails for a missing recipient: absent preferences are created
    /// with default values.
    async fn get_preferences(&self, recipient_id: &str) -> Result<RecipientPreference, StoreError>;

    async fn update_preferences(
        &self,
        recipient_id: &str,
        update: PreferenceUpdate,
    ) -> Result<RecipientPreference, StoreError>;
}

#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn members_with_role(&self, org_id: &str, role: Role) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn email_address(&self, recipient_id: &str) -> Result<Option<String>, StoreError>;
}
