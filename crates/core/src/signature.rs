//! Per-subscription secrets and feed-notification signatures.
//!
//! The hub signs every notification body with HMAC-SHA1 keyed by the secret
//! we handed it at subscribe time, and sends the result as
//! `X-Hub-Signature: sha1=<hex>`. Verification decodes the hex and compares
//! raw digests in constant time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;

const SECRET_BYTES: usize = 32;

/// Fresh random secret for a new hub subscription, base64-encoded.
pub fn generate_secret() -> String {
    let mut secret = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret);
    BASE64.encode(secret)
}

fn feed_hmac(secret: &str, body: &[u8]) -> Vec<u8> {
    // HMAC-SHA1 accepts any key length, so this cannot fail
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA1 accepts any key length");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Signature header value for a body, as the hub would send it.
pub fn sign_feed(secret: &str, body: &[u8]) -> String {
    format!("sha1={}", hex::encode(feed_hmac(secret, body)))
}

/// Verifies an `X-Hub-Signature` header against the raw body.
///
/// A header without the `sha1=` prefix or with undecodable hex fails
/// verification rather than erroring.
pub fn verify_feed_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.strip_prefix("sha1=") else {
        return false;
    };
    let Ok(presented) = hex::decode(hex_digest) else {
        return false;
    };
    let expected = feed_hmac(secret, body);
    expected.ct_eq(&presented).into()
}
