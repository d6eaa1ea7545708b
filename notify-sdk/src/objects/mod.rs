pub mod admin;
pub mod channels;
pub mod events;
pub mod preferences;
pub mod webhook;

pub use admin::{
    DEFAULT_LIST_LIMIT, ListFailedQuery, MAX_LIST_LIMIT, OutboxEntryResponse, OutboxStatus,
    RouteEventResponse, clamp_limit,
};
pub use channels::{Channel, ChannelList, Role};
pub use events::{EventPayload, EventType, NotificationEvent, UnknownEventType};
pub use preferences::{PreferenceUpdate, RecipientPreference};
pub use webhook::WebhookNotification;
