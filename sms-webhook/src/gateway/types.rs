//! Wire types shared with the gateway's webhook API.

use serde::{Deserialize, Serialize};

/// Event types a webhook can subscribe to.
///
/// Only `sms:received` is handled today; anything else fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "sms:received")]
    SmsReceived,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::SmsReceived => "sms:received",
        }
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /webhooks`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterWebhookRequest<'a> {
    pub url: &'a str,
    pub event: WebhookEvent,
}

/// Webhook as returned by the gateway.
///
/// Only `id` is required; the rest is informational.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRecord {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}
