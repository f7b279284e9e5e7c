//! Payload signing and verification.
//!
//! Deliveries carry an HMAC-SHA256 signature over the exact serialized body
//! in the `X-Webhook-Signature` header. [`verify`] is the public contract
//! for receivers implementing signature validation.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by signature header values.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Generate a new webhook signing secret: 32 bytes from the OS CSPRNG,
/// hex-encoded. Secrets are generated server-side only and shown to the
/// caller exactly once, at creation or rotation.
pub fn generate_secret() -> String {
    use rand::rngs::OsRng;
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compute the signature header value for a serialized payload body.
///
/// Returns `"sha256=" + hex(HMAC-SHA256(body, secret))`. The signature
/// covers the exact bytes sent on the wire.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signature header against the raw request body.
///
/// Normalizes an optional `sha256=` prefix and compares in constant time.
/// Fails closed: any malformed input yields `false`, never a panic.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    if signature_header.is_empty() || secret.is_empty() {
        return false;
    }

    let provided = signature_header
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature_header);

    let expected = sign(raw_body, secret);
    let expected_hex = &expected[SIGNATURE_PREFIX.len()..];

    constant_time_eq(provided.as_bytes(), expected_hex.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret_is_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_secret_unique() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn test_sign_is_prefixed_hex() {
        let sig = sign(b"payload", "secret");
        let hex_part = sig.strip_prefix("sha256=").expect("missing prefix");
        // SHA256 = 32 bytes = 64 hex chars
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sign_deterministic() {
        assert_eq!(sign(b"payload", "secret"), sign(b"payload", "secret"));
    }

    #[test]
    fn test_sign_changes_with_body_and_secret() {
        assert_ne!(sign(b"payload1", "secret"), sign(b"payload2", "secret"));
        assert_ne!(sign(b"payload", "secret1"), sign(b"payload", "secret2"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let body = br#"{"event":"lead.created","data":{"amount":150}}"#;
        let sig = sign(body, "my-secret");
        assert!(verify(body, &sig, "my-secret"));
    }

    #[test]
    fn test_verify_accepts_unprefixed_signature() {
        let body = b"test-body";
        let sig = sign(body, "secret");
        let bare = sig.strip_prefix("sha256=").unwrap();
        assert!(verify(body, bare, "secret"));
    }

    #[test]
    fn test_verify_rejects_mutated_body() {
        let body = b"original body";
        let sig = sign(body, "secret");
        assert!(!verify(b"original bodx", &sig, "secret"));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let body = b"body";
        let sig = sign(body, "secret");
        assert!(!verify(body, &sig, "other-secret"));
    }

    #[test]
    fn test_verify_fails_closed_on_malformed_header() {
        assert!(!verify(b"body", "", "secret"));
        assert!(!verify(b"body", "not-hex-at-all", "secret"));
        assert!(!verify(b"body", "sha256=", "secret"));
        assert!(!verify(b"body", "sha256=abc", "secret"));
    }

    #[test]
    fn test_verify_fails_closed_on_empty_secret() {
        let sig = sign(b"body", "secret");
        assert!(!verify(b"body", &sig, ""));
    }
}
