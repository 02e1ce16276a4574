//! Read-only inspection of JWT claims. Signatures are the backend's business;
//! the client only looks at `exp` to avoid sending a token it knows is dead.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Tokens this close to expiry are already treated as expired.
pub const EXPIRY_SKEW_MS: i64 = 5_000;

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Expiry instant from the token payload, if it is a JWT carrying `exp`.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.exp?;
    if !exp.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((exp * 1000.0) as i64)
}

/// `false` for tokens without a readable `exp`; the backend decides then.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match expires_at(token) {
        // An exp at the bottom of chrono's range cannot take the skew; it is
        // long past either way.
        Some(exp) => match exp.checked_sub_signed(Duration::milliseconds(EXPIRY_SKEW_MS)) {
            Some(deadline) => now >= deadline,
            None => true,
        },
        None => false,
    }
}

#[cfg(test)]
pub(crate) fn token_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"SUP01","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}
