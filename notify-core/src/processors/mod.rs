//! Processors of the notification pipeline.
//!
//! - `NotificationRouter`: turns a `NotificationEvent` into outbox entries,
//!   emits `OutboxWritten`
//! - `DeliveryWorker`: drains the outbox through the channel adapters,
//!   woken by `OutboxWritten` or its poll interval

pub mod delivery_worker;
pub mod router;

pub use delivery_worker::{DeliveryWorker, LEASE_EXPIRED_REASON, TickReport};
pub use router::{NotificationRouter, RouteError, RouteOutcome};
