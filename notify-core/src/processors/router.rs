//! NotificationRouter: the Route Event entry point.
//!
//! Runs synchronously in the caller's context and only waits for the
//! outbox write, never for delivery:
//!
//! 1. Look up the routing rule for the event type
//! 2. Resolve recipients from the rule's roles
//! 3. Select channels per recipient from their preferences
//! 4. Write one outbox entry per new (recipient, channel) pair
//! 5. Wake the delivery workers if anything was written

use crate::events::{OutboxWritten, OutboxWrittenSender};
use crate::outbox::OutboxWriter;
use crate::routing::{ChannelSelector, RecipientResolver, RoutingTable};
use crate::store::{MembershipDirectory, PreferenceStore, StoreError};
use notify_sdk::objects::{Channel, NotificationEvent, RouteEventResponse};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

/// The only failure of routing: the intent could not be recorded.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Store error
    #[error("failed to record notification intent: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Distinct recipients resolved for the event.
    pub recipients: usize,
    pub created: u64,
    pub duplicates: u64,
}

impl From<RouteOutcome> for RouteEventResponse {
    fn from(outcome: RouteOutcome) -> Self {
        RouteEventResponse {
            recipients: outcome.recipients,
            created: outcome.created,
            duplicates: outcome.duplicates,
        }
    }
}

#[derive(Clone)]
pub struct NotificationRouter {
    routing: Arc<RoutingTable>,
    resolver: RecipientResolver,
    selector: ChannelSelector,
    writer: OutboxWriter,
    outbox_written: Option<OutboxWrittenSender>,
}

impl NotificationRouter {
    pub fn new(
        routing: Arc<RoutingTable>,
        directory: Arc<dyn MembershipDirectory>,
        preferences: Arc<dyn PreferenceStore>,
        writer: OutboxWriter,
    ) -> Self {
        Self {
            routing,
            resolver: RecipientResolver::new(directory),
            selector: ChannelSelector::new(preferences),
            writer,
            outbox_written: None,
        }
    }

    /// Emit [`OutboxWritten`] whenever a routing call creates entries.
    pub fn with_wake_sender(mut self, sender: OutboxWrittenSender) -> Self {
        self.outbox_written = Some(sender);
        self
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing
    }

    /// Route one event. Idempotent per (type, entity id, entity version).
    pub async fn route_event(&self, event: &NotificationEvent) -> Result<RouteOutcome, RouteError> {
        self.route_event_at(event, OffsetDateTime::now_utc()).await
    }

    pub async fn route_event_at(
        &self,
        event: &NotificationEvent,
        now: OffsetDateTime,
    ) -> Result<RouteOutcome, RouteError> {
        let Some((event_type, rule)) = self.routing.lookup(&event.event_type) else {
            info!(
                event_type = %event.event_type,
                entity_id = %event.entity_id,
                "No routing rule for event type, nothing to notify"
            );
            return Ok(RouteOutcome::default());
        };

        let recipients = self.resolver.resolve(event, rule).await?;
        if recipients.is_empty() {
            debug!(
                event_type = %event.event_type,
                entity_id = %event.entity_id,
                "No recipients matched"
            );
            return Ok(RouteOutcome::default());
        }

        let mut pairs: Vec<(String, Channel)> = Vec::new();
        for recipient_id in &recipients {
            let channels = self.selector.select(recipient_id, event_type, rule).await?;
            if channels.is_empty() {
                debug!(
                    event_type = %event.event_type,
                    recipient_id = %recipient_id,
                    "All channels disabled for recipient, skipping"
                );
            }
            pairs.extend(channels.into_iter().map(|c| (recipient_id.clone(), c)));
        }

        let written = self.writer.create_entries(event, &pairs, now).await?;

        if let Some(sender) = &self.outbox_written {
            if written.created > 0 {
                // No subscribed worker is fine; the entries get picked up on poll.
                let _ = sender.send(OutboxWritten {
                    created: written.created,
                });
            }
        }

        info!(
            event_type = %event.event_type,
            entity_id = %event.entity_id,
            entity_version = event.entity_version,
            recipients = recipients.len(),
            created = written.created,
            duplicates = written.duplicates,
            "Event routed"
        );

        Ok(RouteOutcome {
            recipients: recipients.len(),
            created: written.created,
            duplicates: written.duplicates,
        })
    }
}
