use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session token as issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResource {
    pub jwt: String,
}

#[derive(Debug, Error)]
pub enum TokenDecodeError {
    #[error("jwt is not made of three segments")]
    Malformed,
    #[error("jwt payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("jwt payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("jwt exp claim out of range: {0}")]
    Expiry(i64),
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

impl TokenResource {
    #[must_use]
    pub fn new(jwt: impl Into<String>) -> Self {
        Self { jwt: jwt.into() }
    }

    /// Reads the `exp` claim without verifying the signature; the token is
    /// only ever checked for freshness on this side.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenDecodeError> {
        let mut segments = self.jwt.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(TokenDecodeError::Malformed),
        };
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))?;
        let claims: ExpiryClaims = serde_json::from_slice(&bytes)?;
        DateTime::from_timestamp(claims.exp, 0).ok_or(TokenDecodeError::Expiry(claims.exp))
    }
}
