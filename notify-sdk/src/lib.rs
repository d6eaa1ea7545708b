//! Wire types shared between the notification service, the business
//! modules that produce events, and the endpoints that receive webhooks.

pub mod objects;
pub mod signature;
pub mod webhook;
