//! SMS gateway webhook receiver.
//!
//! Registers an `sms:received` webhook with the SMS gateway at startup,
//! receives the events it pushes, and removes the webhook again at shutdown.
//!
//! ## Flow
//!
//! ```text
//! Config → lifecycle::start (POST /webhooks) → server → POST /webhook/sms-received
//!                                                       (verify → parse → check id → log)
//!        → shutdown signal → lifecycle::stop (DELETE /webhooks/{id})
//! ```

pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod server;
pub mod web;

// Re-export commonly used types
pub use config::{Config, GatewayMode, GatewaySettings, TlsPaths};
pub use gateway::{GatewayClient, WebhookEvent};
pub use lifecycle::Registration;
pub use web::AppState;
