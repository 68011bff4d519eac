//! Inbound `sms:received` webhook payload.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{de, Deserialize, Deserializer};

use crate::gateway::WebhookEvent;

/// Envelope the gateway posts for each event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub device_id: String,
    pub event: WebhookEvent,
    /// Envelope id, unique per delivery
    pub id: String,
    pub webhook_id: String,
    pub payload: SmsReceived,
}

/// The received SMS.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceived {
    pub message: String,
    /// Timestamps sent without an offset are taken as UTC
    #[serde(deserialize_with = "deserialize_received_at")]
    pub received_at: DateTime<FixedOffset>,
    pub message_id: String,
    pub phone_number: String,
    pub sim_number: i64,
}

/// Parse an ISO-8601 date-time, with or without a UTC offset.
pub fn parse_received_at(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(aware) = raw.parse::<DateTime<FixedOffset>>() {
        return Some(aware);
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

fn deserialize_received_at<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_received_at(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid receivedAt date-time: {}", raw)))
}
