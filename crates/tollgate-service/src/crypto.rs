//! Cryptographic utilities for webhook verification.
//!
//! The payment provider signs webhook deliveries with HMAC-SHA256 over
//! `"{timestamp}.{body}"` and sends the result in an `x-payment-signature`
//! header of the form `t=<unix-seconds>,v1=<hex-hmac>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Reject signatures whose timestamp is older than this, to limit replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Compute HMAC-SHA256 and return the hex-encoded result.
///
/// # Panics
///
/// Never panics in practice: HMAC-SHA256 accepts keys of any size per
/// RFC 2104, so `new_from_slice` only fails if the implementation is broken.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a `t=...,v1=...` signature header against the raw request body.
///
/// `now_unix` is the verifier's clock; deliveries signed more than
/// [`SIGNATURE_TOLERANCE_SECS`] ago are rejected as replays.
pub fn verify_signature_header(
    body: &str,
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), String> {
    let mut timestamp: Option<i64> = None;
    let mut signature: Option<&str> = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => {
                signature = Some(value);
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| "missing or invalid timestamp".to_string())?;
    let signature = signature.ok_or_else(|| "missing v1 signature".to_string())?;

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("signature timestamp outside tolerance".to_string());
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{body}"));
    if constant_time_eq(&expected, signature) {
        Ok(())
    } else {
        Err("signature mismatch".to_string())
    }
}

/// Build a signature header for a body, as the provider would.
///
/// The signing counterpart to [`verify_signature_header`]; tests use it to
/// produce provider-style deliveries.
#[must_use]
pub fn sign_payload(body: &str, secret: &str, now_unix: i64) -> String {
    let signature = hmac_sha256_hex(secret, &format!("{now_unix}.{body}"));
    format!("t={now_unix},v1={signature}")
}
