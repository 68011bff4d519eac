//! Webhook endpoint handlers.
//!
//! The SMS handler runs a short pipeline, each stage rejecting the request
//! before the next one runs:
//! 1. Verify the HMAC signature (only when a secret is configured)
//! 2. Parse the JSON payload
//! 3. Check the payload's webhook id against the registered one
//! 4. Log the received SMS

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::lifecycle::Registration;
use crate::web::error::WebhookError;
use crate::web::payload::WebhookPayload;
use crate::web::signature::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::Config;

/// Shared application state.
///
/// Built once after registration and never mutated afterwards.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    /// Shared secret for signature checks; `None` disables them
    pub webhook_secret: Option<Arc<str>>,
    /// Id returned by the gateway at registration
    pub webhook_id: Option<Arc<str>>,
}

impl AppState {
    pub fn new(config: &Config, registration: &Registration) -> Self {
        Self {
            webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
            webhook_id: registration.webhook_id().map(Arc::from),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// SMS Received Webhook
// =============================================================================

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

/// `POST /webhook/sms-received`
///
/// The body is taken as raw bytes because the signature covers the exact
/// bytes sent, not a re-serialization.
pub async fn sms_received_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookError> {
    info!(
        body_length = body.len(),
        has_signature = headers.contains_key(SIGNATURE_HEADER),
        "sms_webhook_received"
    );

    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = header_value(&headers, SIGNATURE_HEADER);
        let timestamp = header_value(&headers, TIMESTAMP_HEADER);

        let (signature, timestamp) = match (signature, timestamp) {
            (Some(signature), Some(timestamp)) => (signature, timestamp),
            (signature, timestamp) => {
                warn!(
                    has_signature = signature.is_some(),
                    has_timestamp = timestamp.is_some(),
                    "sms_webhook_signature_missing"
                );
                return Err(WebhookError::MissingSignature);
            }
        };

        if !verify_signature(secret, &body, timestamp, signature) {
            warn!(timestamp = %timestamp, "sms_webhook_signature_invalid");
            return Err(WebhookError::InvalidSignature);
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "sms_webhook_payload_invalid");
        WebhookError::InvalidPayload(e)
    })?;

    if state.webhook_id.as_deref() != Some(payload.webhook_id.as_str()) {
        warn!(
            received_webhook_id = %payload.webhook_id,
            registered_webhook_id = ?state.webhook_id.as_deref(),
            "sms_webhook_id_mismatch"
        );
        return Err(WebhookError::WebhookIdMismatch {
            received: payload.webhook_id,
            expected: state.webhook_id.as_deref().map(str::to_string),
        });
    }

    let sms = &payload.payload;
    info!(
        sim_number = sms.sim_number,
        phone_number = %sms.phone_number,
        text = %sms.message,
        received_at = %sms.received_at,
        message_id = %sms.message_id,
        device_id = %payload.device_id,
        envelope_id = %payload.id,
        "sms_received"
    );

    Ok(Json(WebhookResponse { status: "ok" }))
}

/// Non-empty header value as a string.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use crate::web::signature::sign;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use std::sync::Mutex;
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    const SECRET: &str = "test-secret";
    const TIMESTAMP: &str = "1718978400";

    fn state(secret: Option<&str>, webhook_id: Option<&str>) -> AppState {
        AppState {
            webhook_secret: secret.map(Arc::from),
            webhook_id: webhook_id.map(Arc::from),
        }
    }

    fn body_for(webhook_id: &str) -> String {
        serde_json::json!({
            "deviceId": "dev_1",
            "event": "sms:received",
            "id": "evt_1",
            "webhookId": webhook_id,
            "payload": {
                "message": "Your code is 1234",
                "receivedAt": "2024-06-21T14:00:00.000+00:00",
                "messageId": "msg_1",
                "phoneNumber": "+15551234567",
                "simNumber": 1
            }
        })
        .to_string()
    }

    async fn post(
        state: AppState,
        body: String,
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Response {
        let mut request = Request::builder()
            .method("POST")
            .uri("/webhook/sms-received")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        if let Some(timestamp) = timestamp {
            request = request.header(TIMESTAMP_HEADER, timestamp);
        }

        router(state)
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap()
    }

    /// JSON log lines written by a test-scoped subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl CapturedLogs {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let subscriber = tracing_subscriber::fmt()
                .json()
                .flatten_event(true)
                .with_writer(self.clone())
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn events(&self, name: &str) -> Vec<serde_json::Value> {
            let raw = self.0.lock().unwrap().clone();
            String::from_utf8(raw)
                .unwrap()
                .lines()
                .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
                .filter(|event| event["message"] == name)
                .collect()
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_signed_valid_payload_accepted() {
        let body = body_for("wh_123");
        let signature = sign(SECRET, body.as_bytes(), TIMESTAMP).unwrap();

        let response = post(
            state(Some(SECRET), Some("wh_123")),
            body,
            Some(&signature),
            Some(TIMESTAMP),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_missing_signature_headers_rejected() {
        let body = body_for("wh_123");
        let signature = sign(SECRET, body.as_bytes(), TIMESTAMP).unwrap();
        let state = state(Some(SECRET), Some("wh_123"));

        let response = post(state.clone(), body.clone(), None, Some(TIMESTAMP)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["detail"],
            "Missing signature header"
        );

        let response = post(state, body, Some(&signature), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_tampered_body_rejected_before_parsing() {
        let original = body_for("wh_123");
        let signature = sign(SECRET, original.as_bytes(), TIMESTAMP).unwrap();

        // Not even valid JSON, still 401 because the signature is checked first.
        let response = post(
            state(Some(SECRET), Some("wh_123")),
            "{not json".to_string(),
            Some(&signature),
            Some(TIMESTAMP),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["detail"], "Invalid signature");

        let tampered = original.replace("1234", "9999");
        let response = post(
            state(Some(SECRET), Some("wh_123")),
            tampered,
            Some(&signature),
            Some(TIMESTAMP),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_id_mismatch_rejected() {
        let body = body_for("wh_999");
        let signature = sign(SECRET, body.as_bytes(), TIMESTAMP).unwrap();

        let response = post(
            state(Some(SECRET), Some("wh_123")),
            body,
            Some(&signature),
            Some(TIMESTAMP),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "Invalid webhook ID");
    }

    #[tokio::test]
    async fn test_invalid_payload_hides_parse_error() {
        let body = body_for("wh_123").replace("\"simNumber\":1", "\"simNumber\":\"one\"");

        let response = post(state(None, Some("wh_123")), body, None, None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"status": "error", "detail": "Invalid payload format"})
        );
    }

    #[tokio::test]
    async fn test_unknown_event_rejected() {
        let body = body_for("wh_123").replace("sms:received", "sms:sent");
        let response = post(state(None, Some("wh_123")), body, None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_no_secret_skips_signature() {
        let response = post(state(None, Some("wh_123")), body_for("wh_123"), None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unregistered_always_rejects() {
        let response = post(state(None, None), body_for("wh_123"), None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_replay_is_accepted() {
        // No replay protection: the same signed request succeeds twice.
        let body = body_for("wh_123");
        let signature = sign(SECRET, body.as_bytes(), TIMESTAMP).unwrap();
        let state = state(Some(SECRET), Some("wh_123"));

        for _ in 0..2 {
            let response = post(
                state.clone(),
                body.clone(),
                Some(&signature),
                Some(TIMESTAMP),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_sms_logged_once_with_all_fields() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let body = body_for("wh_123");
        let signature = sign(SECRET, body.as_bytes(), TIMESTAMP).unwrap();
        let response = post(
            state(Some(SECRET), Some("wh_123")),
            body,
            Some(&signature),
            Some(TIMESTAMP),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let events = logs.events("sms_received");
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event["sim_number"], 1);
        assert_eq!(event["phone_number"], "+15551234567");
        assert_eq!(event["text"], "Your code is 1234");
        assert_eq!(event["received_at"], "2024-06-21 14:00:00 +00:00");
        assert_eq!(event["message_id"], "msg_1");
    }

    #[tokio::test]
    async fn test_sms_not_logged_when_rejected() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        // 401: wrong signature
        let body = body_for("wh_123");
        let response = post(
            state(Some(SECRET), Some("wh_123")),
            body,
            Some("deadbeef"),
            Some(TIMESTAMP),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // 400: foreign webhook id
        let response = post(state(None, Some("wh_123")), body_for("wh_999"), None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // 400: invalid payload
        let response = post(state(None, Some("wh_123")), "{}".to_string(), None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(logs.events("sms_received").is_empty());
        assert_eq!(logs.events("sms_webhook_received").len(), 3);
    }

    #[tokio::test]
    async fn test_received_at_without_offset_accepted() {
        let body = body_for("wh_123").replace("2024-06-21T14:00:00.000+00:00", "2024-06-21T14:00:00");
        let response = post(state(None, Some("wh_123")), body, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(AppState::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_app_state_from_registration() {
        let config = Config::from_lookup(|name| match name {
            "WEBHOOK_SECRET" => Some("s3cret".to_string()),
            _ => None,
        });

        let state = AppState::new(&config, &Registration::Unmanaged);
        assert_eq!(state.webhook_secret.as_deref(), Some("s3cret"));
        assert!(state.webhook_id.is_none());
    }
}
