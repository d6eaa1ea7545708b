use crate::entities::{DeliveryChannel, OutboxStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use notify_sdk::objects::OutboxEntryResponse;
use time::OffsetDateTime;
use uuid::Uuid;

/// One unit of durable delivery work: a single (recipient, channel) pair
/// for a single event version.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub event_type: String,
    pub entity_id: String,
    pub entity_version: i64,
    pub idempotency_key: String,
    pub channel: DeliveryChannel,
    pub recipient_id: String,
    /// Serialized `EventPayload`; opaque to everything but the adapters.
    pub payload: String,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: OffsetDateTime,
    pub last_attempt_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub delivered_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl OutboxEntry {
    /// Build a fresh PENDING entry that is due immediately.
    pub fn pending(insert: NewOutboxEntry, now: OffsetDateTime) -> Self {
        Self {
            id: insert.id,
            event_type: insert.event_type,
            entity_id: insert.entity_id,
            entity_version: insert.entity_version,
            idempotency_key: insert.idempotency_key,
            channel: insert.channel,
            recipient_id: insert.recipient_id,
            payload: insert.payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            max_attempts: insert.max_attempts,
            next_attempt_at: now,
            last_attempt_at: None,
            last_error: None,
            delivered_at: None,
            created_at: now,
        }
    }

    /// FAILED with no attempts left. Never selected again.
    pub fn is_exhausted(&self) -> bool {
        self.status == OutboxStatus::Failed && self.attempts >= self.max_attempts
    }
}

impl From<&OutboxEntry> for OutboxEntryResponse {
    fn from(e: &OutboxEntry) -> Self {
        OutboxEntryResponse {
            id: e.id,
            event_type: e.event_type.clone(),
            entity_id: e.entity_id.clone(),
            entity_version: e.entity_version,
            recipient_id: e.recipient_id.clone(),
            channel: e.channel.into(),
            status: e.status.into(),
            attempts: e.attempts,
            max_attempts: e.max_attempts,
            next_attempt_at: e.next_attempt_at.unix_timestamp(),
            last_error: e.last_error.clone(),
            delivered_at: e.delivered_at.map(|t| t.unix_timestamp()),
            created_at: e.created_at.unix_timestamp(),
        }
    }
}

/// Data for inserting a new outbox entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxEntry {
    pub id: Uuid,
    pub event_type: String,
    pub entity_id: String,
    pub entity_version: i64,
    pub idempotency_key: String,
    pub channel: DeliveryChannel,
    pub recipient_id: String,
    pub payload: String,
    pub max_attempts: i32,
}

#[derive(Debug, Clone)]
/// Return which of the given idempotency keys already exist.
pub struct GetExistingIdempotencyKeys {
    pub keys: Vec<String>,
}

impl Processor<GetExistingIdempotencyKeys> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetExistingIdempotencyKeys")]
    async fn process(&self, query: GetExistingIdempotencyKeys) -> Result<Vec<String>, sqlx::Error> {
        if query.keys.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT idempotency_key
            FROM notification_outbox
            WHERE idempotency_key = ANY($1)
            "#,
        )
        .bind(&query.keys)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Insert multiple outbox entries in a single query.
///
/// Uses `ON CONFLICT DO NOTHING` on the idempotency key, so an entry that
/// raced in between the existence check and this insert is skipped.
/// Returns the number of rows actually inserted.
pub struct InsertOutboxEntries {
    pub entries: Vec<NewOutboxEntry>,
    pub now: OffsetDateTime,
}

impl Processor<InsertOutboxEntries> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOutboxEntries")]
    async fn process(&self, insert: InsertOutboxEntries) -> Result<u64, sqlx::Error> {
        if insert.entries.is_empty() {
            return Ok(0);
        }

        let now = insert.now;
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO notification_outbox \
            (id, event_type, entity_id, entity_version, idempotency_key, channel, recipient_id, \
            payload, status, attempts, max_attempts, next_attempt_at, created_at) ",
        );

        query_builder.push_values(insert.entries, |mut b, entry| {
            b.push_bind(entry.id)
                .push_bind(entry.event_type)
                .push_bind(entry.entity_id)
                .push_bind(entry.entity_version)
                .push_bind(entry.idempotency_key)
                .push_bind(entry.channel)
                .push_bind(entry.recipient_id)
                .push_bind(entry.payload)
                .push_bind(OutboxStatus::Pending)
                .push_bind(0i32)
                .push_bind(entry.max_attempts)
                .push_bind(now)
                .push_bind(now);
        });

        query_builder.push(" ON CONFLICT (idempotency_key) DO NOTHING");

        let result = query_builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Atomically claim due entries for delivery.
///
/// Selects PENDING or FAILED entries that are due and still have attempts
/// left, oldest `next_attempt_at` first, skipping rows locked by other
/// workers. Claimed rows move to PROCESSING with `attempts` incremented and
/// `last_attempt_at` stamped, all in the same statement.
pub struct ClaimDueOutboxEntries {
    pub now: OffsetDateTime,
    pub limit: i64,
}

impl Processor<ClaimDueOutboxEntries> for DatabaseProcessor {
    type Output = Vec<OutboxEntry>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimDueOutboxEntries")]
    async fn process(&self, cmd: ClaimDueOutboxEntries) -> Result<Vec<OutboxEntry>, sqlx::Error> {
        let mut entries: Vec<OutboxEntry> = sqlx::query_as(
            r#"
            UPDATE notification_outbox AS o
            SET status = 'processing',
                attempts = o.attempts + 1,
                last_attempt_at = $1
            FROM (
                SELECT id
                FROM notification_outbox
                WHERE status IN ('pending', 'failed')
                  AND next_attempt_at <= $1
                  AND attempts < max_attempts
                ORDER BY next_attempt_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ) AS due
            WHERE o.id = due.id
            RETURNING
                o.id,
                o.event_type,
                o.entity_id,
                o.entity_version,
                o.idempotency_key,
                o.channel,
                o.recipient_id,
                o.payload,
                o.status,
                o.attempts,
                o.max_attempts,
                o.next_attempt_at,
                o.last_attempt_at,
                o.last_error,
                o.delivered_at,
                o.created_at
            "#,
        )
        .bind(cmd.now)
        .bind(cmd.limit)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING does not preserve the subquery order.
        entries.sort_by_key(|e| e.next_attempt_at);
        Ok(entries)
    }
}

#[derive(Debug, Clone)]
/// Move entries stuck in PROCESSING since before `stale_before` back to
/// FAILED so they become selectable again.
pub struct ReleaseStaleOutboxEntries {
    pub stale_before: OffsetDateTime,
    pub now: OffsetDateTime,
    pub reason: String,
}

impl Processor<ReleaseStaleOutboxEntries> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReleaseStaleOutboxEntries")]
    async fn process(&self, cmd: ReleaseStaleOutboxEntries) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = 'failed',
                last_error = $3,
                next_attempt_at = $2
            WHERE status = 'processing'
              AND last_attempt_at < $1
            "#,
        )
        .bind(cmd.stale_before)
        .bind(cmd.now)
        .bind(cmd.reason)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Restart the lease of a held claim.
pub struct RenewOutboxLease {
    pub id: Uuid,
    pub attempts: i32,
    pub now: OffsetDateTime,
}

impl Processor<RenewOutboxLease> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RenewOutboxLease")]
    async fn process(&self, cmd: RenewOutboxLease) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET last_attempt_at = $3
            WHERE id = $1
              AND attempts = $2
              AND status = 'processing'
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.attempts)
        .bind(cmd.now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// Undo held claims that were never dispatched: give the attempt back and
/// return to PENDING (first attempt) or FAILED.
pub struct ReleaseOutboxClaims {
    pub ids: Vec<Uuid>,
    pub attempts: Vec<i32>,
}

impl Processor<ReleaseOutboxClaims> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReleaseOutboxClaims")]
    async fn process(&self, cmd: ReleaseOutboxClaims) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox AS o
            SET attempts = o.attempts - 1,
                status = CASE
                    WHEN o.attempts = 1 THEN 'pending'::outbox_status
                    ELSE 'failed'::outbox_status
                END
            FROM UNNEST($1::uuid[], $2::int4[]) AS c(id, attempts)
            WHERE o.id = c.id
              AND o.attempts = c.attempts
              AND o.status = 'processing'
            "#,
        )
        .bind(cmd.ids)
        .bind(cmd.attempts)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// PROCESSING -> DELIVERED, only if the caller still holds the claim.
pub struct MarkOutboxEntryDelivered {
    pub id: Uuid,
    pub attempts: i32,
    pub delivered_at: OffsetDateTime,
}

impl Processor<MarkOutboxEntryDelivered> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkOutboxEntryDelivered")]
    async fn process(&self, cmd: MarkOutboxEntryDelivered) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = 'delivered',
                delivered_at = $3,
                last_error = NULL
            WHERE id = $1
              AND attempts = $2
              AND status = 'processing'
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.attempts)
        .bind(cmd.delivered_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// PROCESSING -> FAILED with the next retry time, only if the caller still
/// holds the claim.
pub struct MarkOutboxEntryFailed {
    pub id: Uuid,
    pub attempts: i32,
    pub error: String,
    pub next_attempt_at: OffsetDateTime,
}

impl Processor<MarkOutboxEntryFailed> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkOutboxEntryFailed")]
    async fn process(&self, cmd: MarkOutboxEntryFailed) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = 'failed',
                last_error = $3,
                next_attempt_at = $4
            WHERE id = $1
              AND attempts = $2
              AND status = 'processing'
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.attempts)
        .bind(cmd.error)
        .bind(cmd.next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct GetOutboxEntryById {
    pub id: Uuid,
}

impl Processor<GetOutboxEntryById> for DatabaseProcessor {
    type Output = Option<OutboxEntry>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOutboxEntryById")]
    async fn process(&self, query: GetOutboxEntryById) -> Result<Option<OutboxEntry>, sqlx::Error> {
        sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT
                id,
                event_type,
                entity_id,
                entity_version,
                idempotency_key,
                channel,
                recipient_id,
                payload,
                status,
                attempts,
                max_attempts,
                next_attempt_at,
                last_attempt_at,
                last_error,
                delivered_at,
                created_at
            FROM notification_outbox
            WHERE id = $1
            "#,
        )
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// List FAILED entries that have used up all their attempts, most recent first.
pub struct ListExhaustedOutboxEntries {
    pub limit: i64,
}

impl Processor<ListExhaustedOutboxEntries> for DatabaseProcessor {
    type Output = Vec<OutboxEntry>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListExhaustedOutboxEntries")]
    async fn process(
        &self,
        query: ListExhaustedOutboxEntries,
    ) -> Result<Vec<OutboxEntry>, sqlx::Error> {
        sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT
                id,
                event_type,
                entity_id,
                entity_version,
                idempotency_key,
                channel,
                recipient_id,
                payload,
                status,
                attempts,
                max_attempts,
                next_attempt_at,
                last_attempt_at,
                last_error,
                delivered_at,
                created_at
            FROM notification_outbox
            WHERE status = 'failed'
              AND attempts >= max_attempts
            ORDER BY last_attempt_at DESC NULLS LAST
            LIMIT $1
            "#,
        )
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Re-arm an exhausted entry: attempts reset, PENDING, due at `now`.
pub struct RequeueOutboxEntry {
    pub id: Uuid,
    pub now: OffsetDateTime,
}

impl Processor<RequeueOutboxEntry> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RequeueOutboxEntry")]
    async fn process(&self, cmd: RequeueOutboxEntry) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = 'pending',
                attempts = 0,
                next_attempt_at = $2,
                last_error = NULL
            WHERE id = $1
              AND status = 'failed'
              AND attempts >= max_attempts
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
