//! Gateway webhook signature verification.
//!
//! The gateway signs each delivery with HMAC-SHA256 keyed by the shared
//! secret. The signed message is the raw request body followed by the
//! `X-Timestamp` header value, and the lowercase hex digest is sent in
//! `X-Signature`.
//!
//! The timestamp is only part of the signed message. Its age is not
//! checked, so a captured request can be replayed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded HMAC.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Header carrying the timestamp that was appended to the body before signing.
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Compute the hex signature for `body` and `timestamp`.
pub fn sign(secret: &str, body: &[u8], timestamp: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    mac.update(timestamp.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature in constant time.
pub fn verify_signature(secret: &str, body: &[u8], timestamp: &str, signature: &str) -> bool {
    let expected = match sign(secret, body, timestamp) {
        Some(expected) => expected,
        None => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };
    let valid: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "webhook_signature_mismatch"
        );
    }

    valid
}
