//! Configuration module for environment variable parsing.
//!
//! Reads configuration from the process environment, falling back to a
//! local `.env` file for anything the environment does not set. Optional
//! features are resolved here into typed variants so the rest of the crate
//! never re-checks which fields happen to be present.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Gateway API used when `SMS_GATE_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "https://api.sms-gate.app/3rdparty/v1";

/// Port used for plain HTTP.
pub const HTTP_PORT: u16 = 8080;

/// Port used when TLS material is configured.
pub const HTTPS_PORT: u16 = 8443;

const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 10_000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway base URL, without a trailing slash
    pub api_url: String,

    /// Whether webhook registration against the gateway is performed
    pub gateway: GatewayMode,

    /// Shared secret for HMAC signature verification
    pub webhook_secret: Option<String>,

    /// Certificate and key for serving HTTPS
    pub tls: Option<TlsPaths>,

    /// Timeout applied to every gateway call
    pub gateway_timeout: Duration,
}

/// Registration mode derived from the credential and callback fields.
///
/// Registration needs a username, a password and a callback URL. If any of
/// them is missing the service still runs, it just never talks to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    Disabled,
    Enabled(GatewaySettings),
}

/// Everything needed to call the gateway's webhook API.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// Public URL the gateway should deliver events to
    pub webhook_url: String,
}

// Keep the password out of logs and panic messages.
impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

/// PEM certificate chain and private key paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Config {
    /// Load configuration from the environment and an optional `.env` file.
    ///
    /// Variables already present in the process environment take precedence
    /// over the file. A missing `.env` is not an error.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!(error = %e, "dotenv_load_failed");
            }
        }

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset; whitespace-only values are kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let api_url = get("SMS_GATE_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let gateway = match (
            get("SMS_GATE_API_USERNAME"),
            get("SMS_GATE_API_PASSWORD"),
            get("WEBHOOK_URL"),
        ) {
            (Some(username), Some(password), Some(webhook_url)) => {
                GatewayMode::Enabled(GatewaySettings {
                    api_url: api_url.clone(),
                    username,
                    password,
                    webhook_url,
                })
            }
            _ => GatewayMode::Disabled,
        };

        let tls = match (get("SSL_CERT_PATH"), get("SSL_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => None,
        };

        let gateway_timeout_ms = match get("GATEWAY_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    warn!(env_var = "GATEWAY_TIMEOUT_MS", value = %raw, "Invalid timeout, using default");
                    DEFAULT_GATEWAY_TIMEOUT_MS
                }
            },
            None => DEFAULT_GATEWAY_TIMEOUT_MS,
        };

        Config {
            api_url,
            gateway,
            webhook_secret: get("WEBHOOK_SECRET"),
            tls,
            gateway_timeout: Duration::from_millis(gateway_timeout_ms),
        }
    }

    /// Port to listen on: 8443 when TLS is configured, 8080 otherwise.
    pub fn listen_port(&self) -> u16 {
        if self.tls.is_some() {
            HTTPS_PORT
        } else {
            HTTP_PORT
        }
    }
}
