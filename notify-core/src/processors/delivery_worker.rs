//! DeliveryWorker processor.
//!
//! The DeliveryWorker is responsible for:
//! - Releasing entries whose PROCESSING lease expired (crashed workers)
//! - Atomically claiming due entries (PENDING, or FAILED with attempts left)
//! - Renewing each entry's lease and dispatching it to its channel adapter
//! - Recording DELIVERED, or FAILED with exponential backoff
//! - Handing back undispatched claims when the store fails mid-batch
//!
//! Any number of workers may run against the same outbox; the claim makes
//! each entry visible to exactly one of them at a time. Adapter errors never
//! leave the worker: they always end up as an outbox state transition.

use crate::adapters::templates::{decode_payload, render_in_app};
use crate::adapters::{AdapterError, ChannelAdapters, SignedPayload, TemplateRenderer};
use crate::config::{WebhookConfig, WorkerConfig};
use crate::entities::outbox::OutboxEntry;
use crate::events::OutboxWrittenReceiver;
use crate::outbox::backoff_delay;
use crate::store::{OutboxStore, PreferenceStore, StoreError};
use notify_sdk::objects::{Channel, EventType, WebhookNotification};
use notify_sdk::signature::SignedObject;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// `last_error` of entries whose lease was released.
pub const LEASE_EXPIRED_REASON: &str = "delivery lease expired";

/// What one worker pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Stuck PROCESSING entries moved back to FAILED.
    pub released: u64,
    pub claimed: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Failed entries that just used their last attempt.
    pub exhausted: usize,
    /// Outcomes dropped because the lease had been taken away meanwhile.
    pub lost: usize,
}

pub struct DeliveryWorker {
    outbox: Arc<dyn OutboxStore>,
    preferences: Arc<dyn PreferenceStore>,
    adapters: ChannelAdapters,
    renderer: Arc<TemplateRenderer>,
    webhook_secret: Arc<[u8]>,
    config: WorkerConfig,
    instance: usize,
}

impl DeliveryWorker {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        preferences: Arc<dyn PreferenceStore>,
        adapters: ChannelAdapters,
        renderer: Arc<TemplateRenderer>,
        webhook: &WebhookConfig,
        config: WorkerConfig,
    ) -> Self {
        Self {
            outbox,
            preferences,
            adapters,
            renderer,
            webhook_secret: Arc::from(webhook.secret_bytes()),
            config,
            instance: 0,
        }
    }

    /// Instance number used in logs.
    pub fn with_instance(mut self, instance: usize) -> Self {
        self.instance = instance;
        self
    }

    /// Run until shutdown. Polls every `poll_interval`, or immediately when
    /// `wake_rx` reports new entries.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut wake_rx: Option<OutboxWrittenReceiver>,
    ) {
        info!(instance = self.instance, "DeliveryWorker started");

        loop {
            let full_batch = match self.tick(OffsetDateTime::now_utc()).await {
                Ok(report) => {
                    if report.claimed > 0 || report.released > 0 {
                        debug!(instance = self.instance, ?report, "Delivery tick finished");
                    }
                    report.claimed as i64 >= self.config.batch_size
                }
                Err(e) => {
                    error!(instance = self.instance, error = %e, "Delivery tick failed");
                    false
                }
            };

            // A full batch likely means more due work: go again right away.
            if full_batch && !*shutdown_rx.borrow() {
                continue;
            }

            let mut wake_closed = false;
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(instance = self.instance, "DeliveryWorker received shutdown signal");
                        break;
                    }
                }

                woke = wait_for_wake(&mut wake_rx) => {
                    wake_closed = !woke;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            if wake_closed {
                debug!(instance = self.instance, "Wake-up channel closed, polling only");
                wake_rx = None;
            }
        }

        info!(instance = self.instance, "DeliveryWorker shutdown complete");
    }

    /// One pass: release expired leases, claim a batch, deliver it.
    ///
    /// `now` is the tick start. Later timestamps in the pass advance from it
    /// by the time spent so far. Each entry's lease is renewed right before
    /// its dispatch, and a dispatch is cut off at half the processing
    /// timeout, so a live worker never loses a lease it is still using.
    pub async fn tick(&self, now: OffsetDateTime) -> Result<TickReport, StoreError> {
        let started = Instant::now();
        let clock = || now + started.elapsed();
        let mut report = TickReport::default();

        let stale_before = now - self.config.processing_timeout;
        report.released = self
            .outbox
            .release_stale(stale_before, now, LEASE_EXPIRED_REASON)
            .await?;
        if report.released > 0 {
            warn!(
                instance = self.instance,
                released = report.released,
                "Released outbox entries stuck in processing"
            );
        }

        let entries = self.outbox.claim_due(now, self.config.batch_size).await?;
        report.claimed = entries.len();

        let mut remaining = entries.into_iter();
        while let Some(entry) = remaining.next() {
            let renewed = match self
                .outbox
                .renew_lease(entry.id, entry.attempts, clock())
                .await
            {
                Ok(renewed) => renewed,
                Err(e) => {
                    self.release_undispatched(std::iter::once(entry).chain(remaining))
                        .await;
                    return Err(e);
                }
            };
            if !renewed {
                report.lost += 1;
                warn!(entry_id = %entry.id, attempts = entry.attempts, "Delivery lease lost before dispatch");
                continue;
            }

            let result = self.dispatch_with_deadline(&entry, clock()).await;
            if let Err(e) = self.complete(&entry, result, clock(), &mut report).await {
                self.release_undispatched(remaining).await;
                return Err(e);
            }
        }

        Ok(report)
    }

    /// Give back claims of a tick that stopped early, so their attempt is
    /// not consumed by lease expiry.
    async fn release_undispatched(&self, entries: impl IntoIterator<Item = OutboxEntry>) {
        let claims: Vec<(Uuid, i32)> = entries.into_iter().map(|e| (e.id, e.attempts)).collect();
        if claims.is_empty() {
            return;
        }
        match self.outbox.release_claims(&claims).await {
            Ok(released) => warn!(
                instance = self.instance,
                released,
                "Released undispatched claims after a store error"
            ),
            Err(e) => error!(
                instance = self.instance,
                claims = claims.len(),
                error = %e,
                "Failed to release undispatched claims, they will expire"
            ),
        }
    }

    async fn dispatch_with_deadline(
        &self,
        entry: &OutboxEntry,
        now: OffsetDateTime,
    ) -> Result<(), AdapterError> {
        let deadline = self.config.dispatch_deadline();
        match tokio::time::timeout(deadline, self.dispatch(entry, now)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::TimedOut(deadline)),
        }
    }

    async fn complete(
        &self,
        entry: &OutboxEntry,
        result: Result<(), AdapterError>,
        now: OffsetDateTime,
        report: &mut TickReport,
    ) -> Result<(), StoreError> {
        match result {
            Ok(()) => {
                if self
                    .outbox
                    .mark_delivered(entry.id, entry.attempts, now)
                    .await?
                {
                    report.delivered += 1;
                    info!(
                        entry_id = %entry.id,
                        event_type = %entry.event_type,
                        recipient_id = %entry.recipient_id,
                        channel = ?entry.channel,
                        attempts = entry.attempts,
                        "Notification delivered"
                    );
                } else {
                    report.lost += 1;
                    warn!(entry_id = %entry.id, attempts = entry.attempts, "Delivery lease lost before completion");
                }
            }
            Err(e) => {
                let error = e.to_string();
                let next_attempt_at = now + backoff_delay(entry.attempts);
                if !self
                    .outbox
                    .mark_failed(entry.id, entry.attempts, &error, next_attempt_at)
                    .await?
                {
                    report.lost += 1;
                    warn!(entry_id = %entry.id, attempts = entry.attempts, "Delivery lease lost before completion");
                    return Ok(());
                }

                report.failed += 1;
                let exhausted = entry.attempts >= entry.max_attempts;
                if exhausted {
                    report.exhausted += 1;
                }

                if e.is_contract_violation() {
                    error!(
                        entry_id = %entry.id,
                        event_type = %entry.event_type,
                        channel = ?entry.channel,
                        error = %error,
                        "Channel adapter contract violated"
                    );
                }
                if exhausted {
                    error!(
                        entry_id = %entry.id,
                        event_type = %entry.event_type,
                        recipient_id = %entry.recipient_id,
                        channel = ?entry.channel,
                        attempts = entry.attempts,
                        error = %error,
                        "Delivery attempts exhausted, giving up"
                    );
                } else {
                    warn!(
                        entry_id = %entry.id,
                        event_type = %entry.event_type,
                        recipient_id = %entry.recipient_id,
                        channel = ?entry.channel,
                        attempts = entry.attempts,
                        next_attempt_at = %next_attempt_at,
                        error = %error,
                        "Delivery failed, will retry"
                    );
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&self, entry: &OutboxEntry, now: OffsetDateTime) -> Result<(), AdapterError> {
        match Channel::from(entry.channel) {
            Channel::InApp => {
                let event_type = known_event_type(entry)?;
                let payload = decode_payload(&entry.payload)?;
                let content = render_in_app(event_type, &entry.entity_id, &payload);
                self.adapters
                    .in_app
                    .deliver_in_app(
                        &entry.recipient_id,
                        &content.title,
                        &content.message,
                        content.resource_type,
                        &content.resource_id,
                    )
                    .await
            }
            Channel::Email => {
                let event_type = known_event_type(entry)?;
                let payload = decode_payload(&entry.payload)?;
                let content = self
                    .renderer
                    .render_email(event_type, &entry.entity_id, &payload)?;
                self.adapters
                    .email
                    .deliver_email(
                        &entry.recipient_id,
                        &content.subject,
                        &content.html,
                        &content.text,
                    )
                    .await
            }
            Channel::Webhook => {
                let preference = self
                    .preferences
                    .get_preferences(&entry.recipient_id)
                    .await?;
                let endpoint = preference
                    .webhook_target()
                    .cloned()
                    .ok_or_else(|| AdapterError::MissingEndpoint(entry.recipient_id.clone()))?;

                let signed = SignedObject::new_at(
                    WebhookNotification {
                        notification_id: entry.id,
                        event_type: entry.event_type.clone(),
                        entity_id: entry.entity_id.clone(),
                        entity_version: entry.entity_version,
                        recipient_id: entry.recipient_id.clone(),
                        payload: serde_json::from_str(&entry.payload)?,
                        timestamp: now.unix_timestamp(),
                    },
                    &self.webhook_secret,
                    now.unix_timestamp(),
                )?;
                let payload = SignedPayload {
                    signature: signed.to_header(),
                    body: signed.json,
                };
                self.adapters
                    .webhook
                    .deliver_webhook(&endpoint, &payload)
                    .await
            }
        }
    }
}

fn known_event_type(entry: &OutboxEntry) -> Result<EventType, AdapterError> {
    entry
        .event_type
        .parse()
        .map_err(|e: notify_sdk::objects::UnknownEventType| AdapterError::Contract(e.to_string()))
}

/// Resolves `true` on a wake-up, `false` once the channel is closed.
/// Never resolves without a receiver.
async fn wait_for_wake(wake_rx: &mut Option<OutboxWrittenReceiver>) -> bool {
    let Some(rx) = wake_rx else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => true,
        Err(broadcast::error::RecvError::Closed) => false,
    }
}
