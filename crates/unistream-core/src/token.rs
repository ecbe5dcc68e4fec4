//! Signed-token generation
//!
//! Some upstreams authenticate with a short-lived token minted locally from
//! a compound `id.secret` credential instead of sending the secret itself.
//! The token is three base64url segments (no padding) joined by dots: a
//! compact JSON header, compact JSON claims, and an HMAC-SHA256 signature
//! over `"<header>.<claims>"` keyed by the secret.

use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Token validity window in seconds
pub const TOKEN_TTL_SECS: u64 = 3600;

#[derive(Serialize)]
struct TokenHeader {
    alg: &'static str,
    sign_type: &'static str,
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    api_key: &'a str,
    exp: u64,
    timestamp: u64,
}

/// Mint a signed bearer token from a compound `id.secret` credential.
///
/// Every call produces a fresh token valid for one hour; tokens are never
/// cached or reused.
pub fn sign(compound: &str) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    sign_at(compound, now)
}

/// Mint a token for a fixed point in time.
pub fn sign_at(compound: &str, now: u64) -> Result<String> {
    let parts: Vec<&str> = compound.split('.').collect();
    if parts.len() != 2 {
        return Err(Error::credential(
            "compound credential must have the form 'id.secret'",
        ));
    }
    let (id, secret) = (parts[0], parts[1]);

    let header = serde_json::to_vec(&TokenHeader {
        alg: "HS256",
        sign_type: "SIGN",
    })?;
    let claims = serde_json::to_vec(&TokenClaims {
        api_key: id,
        exp: now + TOKEN_TTL_SECS,
        timestamp: now,
    })?;

    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims)
    );

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::credential(format!("unusable signing secret: {e}")))?;
    mac.update(message.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{message}.{signature}"))
}
