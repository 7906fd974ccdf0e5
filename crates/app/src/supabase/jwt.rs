//! Unverified access-token claims.
//!
//! The client never verifies signatures; the server does that on every
//! request. The payload is only read to learn the expiry and subject of tokens
//! handed over by a deep link.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use super::SupabaseError;

/// Claims the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Subject, the auth user id.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as a unix timestamp.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Decode the payload segment of a JWT without verifying it.
///
/// # Errors
///
/// Returns `SupabaseError::InvalidToken` if the token is not three
/// dot-separated segments or the payload is not base64url JSON.
pub fn decode_claims(token: &str) -> Result<Claims, SupabaseError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(SupabaseError::InvalidToken(
            "expected three segments".to_string(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SupabaseError::InvalidToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| SupabaseError::InvalidToken(format!("payload is not JSON: {e}")))
}
