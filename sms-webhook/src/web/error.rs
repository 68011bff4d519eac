//! Request rejections and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reasons an inbound webhook is rejected.
///
/// The client only ever sees the fixed [`WebhookError::detail`] text; the
/// parse error inside `InvalidPayload` stays in the server logs.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("signature or timestamp header missing")]
    MissingSignature,

    #[error("signature does not match")]
    InvalidSignature,

    #[error("payload does not match schema: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("webhook id {received} does not match registered {expected:?}")]
    WebhookIdMismatch {
        received: String,
        expected: Option<String>,
    },
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::InvalidPayload(_) | WebhookError::WebhookIdMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Client-facing description.
    pub fn detail(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature => "Missing signature header",
            WebhookError::InvalidSignature => "Invalid signature",
            WebhookError::InvalidPayload(_) => "Invalid payload format",
            WebhookError::WebhookIdMismatch { .. } => "Invalid webhook ID",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub detail: &'static str,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                status: "error",
                detail: self.detail(),
            }),
        )
            .into_response()
    }
}
