//! Typed client for the CareBridge REST API.

pub mod client;
pub mod types;

pub use client::{ApiClient, API_PREFIX};
