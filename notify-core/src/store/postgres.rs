//! Postgres implementation of the store traits.
//!
//! Every method delegates to one SQL command in [`crate::entities`].

use super::{ContactDirectory, MembershipDirectory, OutboxStore, PreferenceStore, StoreError};
use crate::entities::memberships::{GetRecipientEmail, ListOrgMembersWithRole};
use crate::entities::outbox::{
    ClaimDueOutboxEntries, GetExistingIdempotencyKeys, GetOutboxEntryById,
    InsertOutboxEntries, ListExhaustedOutboxEntries, MarkOutboxEntryDelivered,
    MarkOutboxEntryFailed, NewOutboxEntry, OutboxEntry, ReleaseOutboxClaims,
    ReleaseStaleOutboxEntries, RenewOutboxLease, RequeueOutboxEntry,
};
use crate::entities::preferences::{
    EnsureRecipientPreference, GetRecipientPreference, SaveRecipientPreference,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use notify_sdk::objects::{PreferenceUpdate, RecipientPreference, Role};
use sqlx::PgPool;
use std::collections::HashSet;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }

    pub fn processor(&self) -> &DatabaseProcessor {
        &self.db
    }
}

#[async_trait]
impl OutboxStore for PgStore {
    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, StoreError> {
        let found = self
            .db
            .process(GetExistingIdempotencyKeys {
                keys: keys.to_vec(),
            })
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn insert_entries(
        &self,
        entries: Vec<NewOutboxEntry>,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        Ok(self.db.process(InsertOutboxEntries { entries, now }).await?)
    }

    async fn release_stale(
        &self,
        stale_before: OffsetDateTime,
        now: OffsetDateTime,
        reason: &str,
    ) -> Result<u64, StoreError> {
        Ok(self
            .db
            .process(ReleaseStaleOutboxEntries {
                stale_before,
                now,
                reason: reason.to_owned(),
            })
            .await?)
    }

    async fn claim_due(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<OutboxEntry>, StoreError> {
        Ok(self.db.process(ClaimDueOutboxEntries { now, limit }).await?)
    }

    async fn renew_lease(
        &self,
        id: Uuid,
        attempts: i32,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        Ok(self
            .db
            .process(RenewOutboxLease { id, attempts, now })
            .await?)
    }

    async fn release_claims(&self, claims: &[(Uuid, i32)]) -> Result<u64, StoreError> {
        if claims.is_empty() {
            return Ok(0);
        }
        let (ids, attempts) = claims.iter().copied().unzip();
        Ok(self
            .db
            .process(ReleaseOutboxClaims { ids, attempts })
            .await?)
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        attempts: i32,
        delivered_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        Ok(self
            .db
            .process(MarkOutboxEntryDelivered {
                id,
                attempts,
                delivered_at,
            })
            .await?)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: i32,
        error: &str,
        next_attempt_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        Ok(self
            .db
            .process(MarkOutboxEntryFailed {
                id,
                attempts,
                error: error.to_owned(),
                next_attempt_at,
            })
            .await?)
    }

    async fn get_entry(&self, id: Uuid) -> Result<Option<OutboxEntry>, StoreError> {
        Ok(self.db.process(GetOutboxEntryById { id }).await?)
    }

    async fn list_exhausted(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        Ok(self.db.process(ListExhaustedOutboxEntries { limit }).await?)
    }

    async fn requeue(&self, id: Uuid, now: OffsetDateTime) -> Result<bool, StoreError> {
        Ok(self.db.process(RequeueOutboxEntry { id, now }).await?)
    }
}

#[async_trait]
impl PreferenceStore for PgStore {
    async fn get_preferences(&self, recipient_id: &str) -> Result<RecipientPreference, StoreError> {
        if let Some(preference) = self
            .db
            .process(GetRecipientPreference {
                recipient_id: recipient_id.to_owned(),
            })
            .await?
        {
            return Ok(preference);
        }

        self.db
            .process(EnsureRecipientPreference {
                recipient_id: recipient_id.to_owned(),
                now: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(RecipientPreference::default())
    }

    async fn update_preferences(
        &self,
        recipient_id: &str,
        update: PreferenceUpdate,
    ) -> Result<RecipientPreference, StoreError> {
        let mut preference = self.get_preferences(recipient_id).await?;
        preference.apply(update);
        self.db
            .process(SaveRecipientPreference {
                recipient_id: recipient_id.to_owned(),
                preference: preference.clone(),
                now: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(preference)
    }
}

#[async_trait]
impl MembershipDirectory for PgStore {
    async fn members_with_role(&self, org_id: &str, role: Role) -> Result<Vec<String>, StoreError> {
        Ok(self
            .db
            .process(ListOrgMembersWithRole {
                org_id: org_id.to_owned(),
                role,
            })
            .await?)
    }
}

#[async_trait]
impl ContactDirectory for PgStore {
    async fn email_address(&self, recipient_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .db
            .process(GetRecipientEmail {
                recipient_id: recipient_id.to_owned(),
            })
            .await?)
    }
}
