//! Stateless handshake tokens: HMAC-SHA256 issuance and verification.
//!
//! A token carries its own issuance/expiry window, so verification is a pure
//! function of `(token, user_id, secret, now)` and the verifier needs no
//! server-side session storage.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use callboard_common::time::now_epoch_ms;

use crate::config::DEFAULT_HANDSHAKE_TTL_SECS;

type HmacSha256 = Hmac<Sha256>;

/// Validity window of a verified token, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenWindow {
    pub issued_at: i64,
    pub expires_at: i64,
}

/// A freshly issued handshake token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// `"<issuedAt>.<expiresAt>.<hexSignature>"`
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Why verification failed. Checks run in declaration order; the first
/// failing check wins and no further checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    MissingSecret,
    MissingToken,
    MissingUserId,
    InvalidFormat,
    InvalidTimestamp,
    InvalidSignature,
    Expired,
}

impl HandshakeError {
    /// Stable snake_case reason code used in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            HandshakeError::MissingSecret => "missing_secret",
            HandshakeError::MissingToken => "missing_token",
            HandshakeError::MissingUserId => "missing_user_id",
            HandshakeError::InvalidFormat => "invalid_format",
            HandshakeError::InvalidTimestamp => "invalid_timestamp",
            HandshakeError::InvalidSignature => "invalid_signature",
            HandshakeError::Expired => "expired",
        }
    }
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for HandshakeError {}

/// Issue a handshake token for `user_id`.
///
/// `issued_at` defaults to the current time; a zero `ttl_secs` falls back to
/// the default lifetime.
pub fn create_handshake_token(
    user_id: &str,
    secret: &str,
    issued_at: Option<i64>,
    ttl_secs: Option<u64>,
) -> IssuedToken {
    let issued_at = issued_at.unwrap_or_else(now_epoch_ms);
    let ttl = ttl_secs
        .filter(|ttl| *ttl > 0)
        .unwrap_or(DEFAULT_HANDSHAKE_TTL_SECS);
    let expires_at = issued_at + (ttl as i64) * 1000;

    let signature = sign(user_id, secret, issued_at, expires_at);
    IssuedToken {
        token: format!("{issued_at}.{expires_at}.{signature}"),
        issued_at,
        expires_at,
    }
}

/// Verify a handshake token against the claimed `user_id`.
///
/// Empty strings count as missing. `now` defaults to the current time.
pub fn verify_handshake_token(
    token: &str,
    user_id: &str,
    secret: &str,
    now: Option<i64>,
) -> Result<TokenWindow, HandshakeError> {
    if secret.is_empty() {
        return Err(HandshakeError::MissingSecret);
    }
    if token.is_empty() {
        return Err(HandshakeError::MissingToken);
    }
    if user_id.is_empty() {
        return Err(HandshakeError::MissingUserId);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(HandshakeError::InvalidFormat);
    }

    let issued_at: i64 = parts[0]
        .parse()
        .map_err(|_| HandshakeError::InvalidTimestamp)?;
    let expires_at: i64 = parts[1]
        .parse()
        .map_err(|_| HandshakeError::InvalidTimestamp)?;
    if expires_at < issued_at {
        return Err(HandshakeError::InvalidTimestamp);
    }

    // Constant-time comparison; decode failures and length mismatches count
    // as a signature mismatch.
    let presented = hex::decode(parts[2]).map_err(|_| HandshakeError::InvalidSignature)?;
    let mut mac = mac_for(user_id, secret, issued_at, expires_at);
    mac.verify_slice(&presented)
        .map_err(|_| HandshakeError::InvalidSignature)?;

    let now = now.unwrap_or_else(now_epoch_ms);
    if expires_at < now {
        return Err(HandshakeError::Expired);
    }

    Ok(TokenWindow {
        issued_at,
        expires_at,
    })
}

fn mac_for(user_id: &str, secret: &str, issued_at: i64, expires_at: i64) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{user_id}:{issued_at}:{expires_at}").as_bytes());
    mac
}

fn sign(user_id: &str, secret: &str, issued_at: i64, expires_at: i64) -> String {
    hex::encode(mac_for(user_id, secret, issued_at, expires_at).finalize().into_bytes())
}
