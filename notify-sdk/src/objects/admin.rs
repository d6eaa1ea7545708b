//! Admin and service API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::channels::Channel;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Outbox entry status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `notify-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboxStatus::Pending => write!(f, "pending"),
            OutboxStatus::Processing => write!(f, "processing"),
            OutboxStatus::Delivered => write!(f, "delivered"),
            OutboxStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Full outbox entry detail, including delivery diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntryResponse {
    pub id: Uuid,
    pub event_type: String,
    pub entity_id: String,
    pub entity_version: i64,
    pub recipient_id: String,
    pub channel: Channel,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
    pub delivered_at: Option<i64>,
    pub created_at: i64,
}

/// Result of routing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEventResponse {
    /// Distinct recipients resolved for the event.
    pub recipients: usize,
    /// Outbox entries written by this call.
    pub created: u64,
    /// (recipient, channel) pairs skipped because their entry already existed.
    pub duplicates: u64,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFailedQuery {
    pub limit: Option<i64>,
}

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 500;

/// Clamp a caller-provided limit into `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}
