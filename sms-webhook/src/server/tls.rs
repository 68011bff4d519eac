//! TLS server configuration from PEM files.

use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    ServerConfig,
};
use rustls_pemfile::{certs, private_key};

use crate::config::TlsPaths;

/// Build a rustls server config from the configured certificate and key.
pub fn load_server_config(paths: &TlsPaths) -> Result<Arc<ServerConfig>> {
    let certs = load_certs(&paths.cert_path)?;
    let key = load_private_key(&paths.key_path)?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("Failed to create TLS config")?;

    // Enable HTTP/2 and HTTP/1.1
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Load certificates from a PEM file
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open certificate file {}", path.display()))?;

    let certs = certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificates in {}", path.display()))?;

    if certs.is_empty() {
        return Err(anyhow!("No certificates found in {}", path.display()));
    }

    Ok(certs)
}

/// Load private key from a PEM file
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open key file {}", path.display()))?;

    private_key(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read private key from {}", path.display()))?
        .ok_or_else(|| anyhow!("No private key found in {}", path.display()))
}
