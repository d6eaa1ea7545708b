//! In-process signals between the router and the delivery workers.
//!
//! # Event Flow
//!
//! 1. `NotificationRouter` writes outbox entries and emits `OutboxWritten`
//! 2. Every `DeliveryWorker` subscribed to the channel wakes up and polls
//!    instead of waiting for its next interval
//!
//! Signals are hints only: the outbox table stays the source of truth, and
//! a worker that misses a signal still finds the entries on its next poll.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, OutboxWrittenReceiver, OutboxWrittenSender, outbox_written_channel,
};

pub use types::OutboxWritten;
