pub mod memberships;
pub mod notifications;
pub mod outbox;
pub mod preferences;

use notify_sdk::objects::{Channel as SdkChannel, OutboxStatus as SdkOutboxStatus};

/// Delivery channel for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `notify_sdk::objects::Channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "notification_channel")]
pub enum DeliveryChannel {
    InApp,
    Email,
    Webhook,
}

impl From<DeliveryChannel> for SdkChannel {
    fn from(value: DeliveryChannel) -> Self {
        match value {
            DeliveryChannel::InApp => SdkChannel::InApp,
            DeliveryChannel::Email => SdkChannel::Email,
            DeliveryChannel::Webhook => SdkChannel::Webhook,
        }
    }
}

impl From<SdkChannel> for DeliveryChannel {
    fn from(value: SdkChannel) -> Self {
        match value {
            SdkChannel::InApp => DeliveryChannel::InApp,
            SdkChannel::Email => DeliveryChannel::Email,
            SdkChannel::Webhook => DeliveryChannel::Webhook,
        }
    }
}

/// Outbox entry status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `notify_sdk::objects::OutboxStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "outbox_status")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

impl From<OutboxStatus> for SdkOutboxStatus {
    fn from(value: OutboxStatus) -> Self {
        match value {
            OutboxStatus::Pending => SdkOutboxStatus::Pending,
            OutboxStatus::Processing => SdkOutboxStatus::Processing,
            OutboxStatus::Delivered => SdkOutboxStatus::Delivered,
            OutboxStatus::Failed => SdkOutboxStatus::Failed,
        }
    }
}

impl From<SdkOutboxStatus> for OutboxStatus {
    fn from(value: SdkOutboxStatus) -> Self {
        match value {
            SdkOutboxStatus::Pending => OutboxStatus::Pending,
            SdkOutboxStatus::Processing => OutboxStatus::Processing,
            SdkOutboxStatus::Delivered => OutboxStatus::Delivered,
            SdkOutboxStatus::Failed => OutboxStatus::Failed,
        }
    }
}
