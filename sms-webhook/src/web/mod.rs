//! Web server module for handling inbound gateway webhooks.
//!
//! Exposes a single `POST /webhook/sms-received` endpoint (plus `/health`).
//! Requests are verified, validated and logged; nothing is stored.

pub mod error;
pub mod handlers;
pub mod payload;
pub mod signature;

pub use error::WebhookError;
pub use handlers::{health, sms_received_webhook, AppState, HealthResponse, WebhookResponse};
pub use payload::{SmsReceived, WebhookPayload};
pub use signature::{sign, verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
