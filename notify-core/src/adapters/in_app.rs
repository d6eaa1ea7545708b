//! In-app inbox adapter.
//!
//! A successful delivery is one row in the `notifications` read model.

use super::{AdapterError, InAppChannel, require_non_empty};
use crate::entities::notifications::{InsertNotification, Notification};
use crate::framework::DatabaseProcessor;
use crate::store::StoreError;
use async_trait::async_trait;
use kanau::processor::Processor;
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

fn validate(
    recipient_id: &str,
    title: &str,
    resource_type: &str,
    resource_id: &str,
) -> Result<(), AdapterError> {
    require_non_empty("recipient_id", recipient_id)?;
    require_non_empty("title", title)?;
    require_non_empty("resource_type", resource_type)?;
    require_non_empty("resource_id", resource_id)
}

#[derive(Clone)]
pub struct PgInAppChannel {
    db: DatabaseProcessor,
}

impl PgInAppChannel {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InAppChannel for PgInAppChannel {
    async fn deliver_in_app(
        &self,
        recipient_id: &str,
        title: &str,
        message: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<(), AdapterError> {
        validate(recipient_id, title, resource_type, resource_id)?;

        let notification = self
            .db
            .process(InsertNotification {
                recipient_id: recipient_id.to_owned(),
                title: title.to_owned(),
                message: message.to_owned(),
                resource_type: resource_type.to_owned(),
                resource_id: resource_id.to_owned(),
                now: OffsetDateTime::now_utc(),
            })
            .await
            .map_err(StoreError::from)?;

        debug!(
            notification_id = %notification.id,
            recipient_id,
            resource_type,
            resource_id,
            "In-app notification created"
        );
        Ok(())
    }
}

/// Keeps created notifications in memory.
#[derive(Default)]
pub struct MemoryInAppChannel {
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryInAppChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InAppChannel for MemoryInAppChannel {
    async fn deliver_in_app(
        &self,
        recipient_id: &str,
        title: &str,
        message: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<(), AdapterError> {
        validate(recipient_id, title, resource_type, resource_id)?;

        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notification {
                id: Uuid::now_v7(),
                recipient_id: recipient_id.to_owned(),
                title: title.to_owned(),
                message: message.to_owned(),
                resource_type: resource_type.to_owned(),
                resource_id: resource_id.to_owned(),
                read_at: None,
                created_at: OffsetDateTime::now_utc(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_channel_records_notification() {
        let channel = MemoryInAppChannel::new();
        channel
            .deliver_in_app("alice", "New ticket", "Leaking tap", "ticket", "t1")
            .await
            .unwrap();

        let rows = channel.notifications();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipient_id, "alice");
        assert_eq!(rows[0].resource_id, "t1");
        assert!(rows[0].read_at.is_none());
    }

    #[tokio::test]
    async fn test_missing_fields_violate_contract() {
        let channel = MemoryInAppChannel::new();
        let err = channel
            .deliver_in_app("alice", "New ticket", "", "ticket", " ")
            .await
            .unwrap_err();
        assert!(err.is_contract_violation());
        assert!(channel.notifications().is_empty());

        let err = channel
            .deliver_in_app("alice", "", "body", "ticket", "t1")
            .await
            .unwrap_err();
        assert!(err.is_contract_violation());
    }
}
