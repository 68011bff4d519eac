//! HTTP client for the gateway's `/webhooks` resource.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, Response};
use tracing::info;

use super::types::{RegisterWebhookRequest, WebhookEvent, WebhookRecord};
use crate::config::GatewaySettings;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Authenticated client for registering and removing webhooks.
///
/// Every call uses HTTP basic auth with the configured credentials.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    settings: GatewaySettings,
}

impl GatewayClient {
    /// Create a client whose calls time out after `timeout`.
    pub fn new(settings: GatewaySettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, settings })
    }

    /// Register the `sms:received` webhook and return its gateway id.
    pub async fn register_webhook(&self) -> Result<String> {
        let url = format!("{}/webhooks", self.settings.api_url);

        info!(
            url = %url,
            callback_url = %self.settings.webhook_url,
            event = %WebhookEvent::SmsReceived,
            "webhook_register_starting"
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .json(&RegisterWebhookRequest {
                url: &self.settings.webhook_url,
                event: WebhookEvent::SmsReceived,
            })
            .send()
            .await
            .context("Failed to send webhook registration request")?;

        let response = ensure_success(response, "register").await?;

        let record: WebhookRecord = response
            .json()
            .await
            .context("Failed to parse webhook registration response")?;

        info!(
            webhook_id = %record.id,
            registered_url = ?record.url,
            registered_event = ?record.event,
            "webhook_registered"
        );

        Ok(record.id)
    }

    /// Delete a previously registered webhook.
    pub async fn unregister_webhook(&self, webhook_id: &str) -> Result<()> {
        let url = format!("{}/webhooks/{}", self.settings.api_url, webhook_id);

        info!(url = %url, webhook_id = %webhook_id, "webhook_unregister_starting");

        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .send()
            .await
            .context("Failed to send webhook unregistration request")?;

        ensure_success(response, "unregister").await?;

        info!(webhook_id = %webhook_id, "webhook_unregistered");

        Ok(())
    }
}

/// Turn a non-2xx response into an error that carries the status and body.
async fn ensure_success(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    bail!(
        "Gateway {} request failed with status {}: {}",
        operation,
        status,
        body.chars().take(500).collect::<String>()
    );
}
