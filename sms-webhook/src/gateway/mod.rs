//! SMS gateway API client.
//!
//! Covers the two calls this service makes against the gateway:
//! registering the `sms:received` webhook at startup and deleting it at
//! shutdown.

pub mod client;
pub mod types;

pub use client::GatewayClient;
pub use types::{RegisterWebhookRequest, WebhookEvent, WebhookRecord};
