//! Unverified JWT claim inspection.
//!
//! The client never holds the issuer's signing key, so the payload segment is
//! decoded without signature verification. The only claim the refresh
//! scheduler relies on is `exp`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{AuthError, AuthResult};

/// Claims read from an access token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    /// Expiration time (Unix seconds).
    #[serde(default)]
    pub exp: Option<i64>,

    /// Issued at (Unix seconds).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Subject.
    #[serde(default)]
    pub sub: Option<String>,

    /// OAuth client the token was issued to.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl TokenClaims {
    /// Expiry as a UTC instant, if present and representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Strip a leading `bearer ` scheme, case-insensitively.
#[must_use]
pub fn strip_bearer(token: &str) -> &str {
    let trimmed = token.trim();
    match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim_start(),
        _ => trimmed,
    }
}

/// Decode the claims segment of a JWT without verifying it.
///
/// # Errors
/// Returns [`AuthError::MalformedToken`] if the token is not three
/// dot-separated segments or the payload is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> AuthResult<TokenClaims> {
    let token = strip_bearer(token);
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken(
            "expected three dot-separated segments".into(),
        ));
    };

    // Some issuers pad the segment even though RFC 7515 forbids it.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not a claims object: {e}")))
}

/// Decode the expiry of an access token.
///
/// # Errors
/// Returns [`AuthError::MalformedToken`] for undecodable tokens and
/// [`AuthError::MissingExpiry`] when the `exp` claim is absent or out of range.
pub fn expiry_of(token: &str) -> AuthResult<DateTime<Utc>> {
    decode_claims(token)?
        .expires_at()
        .ok_or(AuthError::MissingExpiry)
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
