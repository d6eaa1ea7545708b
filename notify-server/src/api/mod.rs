//! HTTP API.
//!
//! - `service`: event intake for business modules (signed bodies)
//! - `admin`: outbox inspection and preference management (admin secret)

pub mod admin;
pub mod extractors;
pub mod service;
