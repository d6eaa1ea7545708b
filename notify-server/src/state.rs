//! Application state shared across all request handlers.

use crate::config::runtime::RuntimeConfig;
use notify_core::processors::NotificationRouter;
use notify_core::store::{OutboxStore, PreferenceStore};
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub router: NotificationRouter,
    pub outbox: Arc<dyn OutboxStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub config: Arc<RuntimeConfig>,
}

impl AppState {
    pub fn new(
        router: NotificationRouter,
        outbox: Arc<dyn OutboxStore>,
        preferences: Arc<dyn PreferenceStore>,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            router,
            outbox,
            preferences,
            config,
        }
    }
}
