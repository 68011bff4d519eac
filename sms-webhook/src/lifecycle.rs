//! Webhook registration lifecycle.
//!
//! ```text
//! start:  Disabled gateway  → Unmanaged
//!         Enabled gateway   → Registered { webhook_id }   (failure aborts startup)
//! stop:   Registered        → DELETE /webhooks/{id}       (failure is logged)
//!         Unmanaged         → nothing
//! ```
//!
//! The [`Registration`] produced by [`start`] is immutable and is handed to
//! the web layer before the server starts accepting requests.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::{Config, GatewayMode};
use crate::gateway::GatewayClient;

/// Outcome of the startup registration.
#[derive(Debug, Clone)]
pub enum Registration {
    /// No credentials or callback URL were configured; no webhook exists.
    Unmanaged,
    /// A webhook was registered with the gateway.
    Registered {
        webhook_id: String,
        client: GatewayClient,
    },
}

impl Registration {
    /// Id of the registered webhook, if any.
    pub fn webhook_id(&self) -> Option<&str> {
        match self {
            Registration::Unmanaged => None,
            Registration::Registered { webhook_id, .. } => Some(webhook_id),
        }
    }
}

/// Register the webhook if the gateway is configured.
///
/// A failed registration is returned as an error; the caller is expected to
/// abort startup rather than serve without a webhook.
pub async fn start(config: &Config) -> Result<Registration> {
    start_with_timeout(&config.gateway, config.gateway_timeout).await
}

async fn start_with_timeout(gateway: &GatewayMode, timeout: Duration) -> Result<Registration> {
    let settings = match gateway {
        GatewayMode::Disabled => {
            info!("webhook_registration_skipped");
            return Ok(Registration::Unmanaged);
        }
        GatewayMode::Enabled(settings) => settings.clone(),
    };

    let client = GatewayClient::new(settings, timeout)?;
    let webhook_id = client
        .register_webhook()
        .await
        .context("Failed to register webhook with SMS gateway")?;

    Ok(Registration::Registered { webhook_id, client })
}

/// Remove the registered webhook. Errors are logged, never returned.
pub async fn stop(registration: Registration) {
    match registration {
        Registration::Unmanaged => {
            info!("webhook_unregistration_skipped");
        }
        Registration::Registered { webhook_id, client } => {
            if let Err(e) = client.unregister_webhook(&webhook_id).await {
                error!(webhook_id = %webhook_id, error = %format!("{:#}", e), "webhook_unregister_failed");
            }
        }
    }
}
