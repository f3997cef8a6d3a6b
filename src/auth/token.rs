use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

/// Tokens expiring within this window are refreshed ahead of time.
pub const REFRESH_MARGIN_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The token carries no `exp` claim.
    Never,
    At(DateTime<Utc>),
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Reads the `exp` claim of a JWT without verifying its signature.
/// Returns `None` when the token is not a decodable JWT.
pub fn expiry(token: &str) -> Option<Expiry> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;

    match claims.exp {
        None => Some(Expiry::Never),
        Some(exp) => DateTime::from_timestamp(exp, 0).map(Expiry::At),
    }
}

/// True if the token is expired or expires within [`REFRESH_MARGIN_SECS`].
/// Opaque tokens always need a refresh since their lifetime is unknown.
pub fn needs_refresh(token: &str, now: DateTime<Utc>) -> bool {
    match expiry(token) {
        Some(Expiry::Never) => false,
        Some(Expiry::At(exp)) => now + TimeDelta::seconds(REFRESH_MARGIN_SECS) >= exp,
        None => true,
    }
}

/// True only for JWTs whose `exp` is in the past.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    matches!(expiry(token), Some(Expiry::At(exp)) if exp <= now)
}

#[cfg(test)]
pub(crate) fn fake_jwt(exp: Option<i64>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = match exp {
        Some(exp) => serde_json::json!({ "sub": "user", "exp": exp }),
        None => serde_json::json!({ "sub": "user" }),
    };
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
