//! Configuration types for the notification engine.
//!
//! These types represent the validated runtime configuration used by the
//! workers and adapters. The actual config loading/parsing is handled by
//! the server crate.

mod email;
mod webhook;
mod worker;

pub use email::EmailConfig;
pub use webhook::WebhookConfig;
pub use worker::WorkerConfig;
