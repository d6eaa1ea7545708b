#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod adapters;
pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod outbox;
pub mod processors;
pub mod routing;
pub mod store;
