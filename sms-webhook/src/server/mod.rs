//! HTTP(S) listener for the webhook endpoint.
//!
//! Binds all interfaces. With TLS material configured the service listens on
//! 8443 and terminates TLS itself; otherwise it serves plain HTTP on 8080.

pub mod tls;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
};
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::web::{health, sms_received_webhook, AppState};
use crate::Config;

/// Path the gateway delivers `sms:received` events to.
pub const WEBHOOK_PATH: &str = "/webhook/sms-received";

/// Pause after a failed `accept` so persistent errors (e.g. EMFILE) do not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Peers that do not finish the TLS handshake in time are dropped.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(sms_received_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(config: &Config, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    // Load TLS material before binding so a bad certificate fails fast.
    let acceptor = match &config.tls {
        Some(paths) => Some(TlsAcceptor::from(tls::load_server_config(paths)?)),
        None => None,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port()));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    match acceptor {
        Some(acceptor) => {
            info!(address = %addr, tls = true, "web_server_listening");
            serve_tls(listener, acceptor, app, shutdown).await;
        }
        None => {
            info!(address = %addr, tls = false, "web_server_listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
                .context("Server error")?;
        }
    }

    Ok(())
}

/// Accept loop for HTTPS. Stops accepting once `shutdown` resolves.
async fn serve_tls<F>(listener: TcpListener, acceptor: TlsAcceptor, app: Router, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = accept_next(&listener) => accepted,
            _ = &mut shutdown => break,
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(app.clone());

        tokio::spawn(async move {
            let stream = match with_timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "tls_handshake_failed");
                    return;
                }
            };

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                warn!(peer = %peer, error = %e, "connection_error");
            }
        });
    }
}

/// Accept the next connection, backing off after each failure.
async fn accept_next(listener: &TcpListener) -> (TcpStream, SocketAddr) {
    loop {
        match listener.accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                warn!(error = %e, "tcp_accept_failed");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

/// Bound an I/O future, turning expiry into `ErrorKind::TimedOut`.
async fn with_timeout<T, F>(limit: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out")),
    }
}

/// Create a future that completes when a shutdown signal is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
