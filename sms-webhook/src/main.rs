//! SMS Webhook - receives `sms:received` events from the SMS gateway.
//!
//! This binary:
//! - Registers its callback URL with the gateway (when credentials are set)
//! - Verifies, validates and logs each inbound SMS notification
//! - Unregisters the webhook on SIGINT/SIGTERM

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use smsgate::{lifecycle, server, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("sms_webhook_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        api_url = %config.api_url,
        gateway_enabled = matches!(config.gateway, smsgate::GatewayMode::Enabled(_)),
        webhook_secret_configured = config.webhook_secret.is_some(),
        tls_configured = config.tls.is_some(),
        port = config.listen_port(),
        gateway_timeout_ms = config.gateway_timeout.as_millis() as u64,
        "config_loaded"
    );

    // Registration failure aborts startup
    let registration = lifecycle::start(&config).await?;
    info!(webhook_id = ?registration.webhook_id(), "webhook_lifecycle_started");

    let state = AppState::new(&config, &registration);
    let served = server::serve(&config, state, server::shutdown_signal()).await;

    // Unregister even if the server failed
    lifecycle::stop(registration).await;

    served?;

    info!("sms_webhook_shutdown_complete");

    Ok(())
}
