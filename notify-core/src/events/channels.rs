//! Event channel factories and handles.

use super::types::OutboxWritten;
use tokio::sync::broadcast;

/// Default buffer size for event channels.
///
/// A lagging worker only loses wake-ups, never work.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for OutboxWritten events.
pub type OutboxWrittenSender = broadcast::Sender<OutboxWritten>;
/// Receiver handle for OutboxWritten events.
pub type OutboxWrittenReceiver = broadcast::Receiver<OutboxWritten>;

/// Create a new OutboxWritten channel.
///
/// Each delivery worker takes its own receiver via
/// [`broadcast::Sender::subscribe`].
pub fn outbox_written_channel() -> (OutboxWrittenSender, OutboxWrittenReceiver) {
    broadcast::channel(DEFAULT_CHANNEL_BUFFER)
}
