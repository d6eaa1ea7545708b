//! Event type definitions.

/// Emitted after `route_event` persisted at least one new outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxWritten {
    /// Number of entries created by the routing call.
    pub created: u64,
}
