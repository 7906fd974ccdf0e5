//! Auth callback deep links.
//!
//! Email confirmation and magic links redirect to the app's custom scheme
//! (`com.guiacomercial.miapp://auth-callback#access_token=...&refresh_token=...`).
//! The tokens ride in the fragment; some providers put them in the query
//! string instead, which is accepted as a fallback.

use thiserror::Error;
use url::Url;

use crate::supabase::TokenPair;

/// Why a deep link did not yield a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeepLinkError {
    /// Not a URL at all.
    #[error("invalid deep link: {0}")]
    InvalidUrl(String),

    /// A URL without the token pair (e.g. a plain app-open link).
    #[error("deep link carries no session tokens")]
    MissingTokens,

    /// The auth service redirected with an error (expired or reused link).
    #[error("auth link rejected: {0}")]
    Rejected(String),
}

/// A deep link that carries a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    pub tokens: TokenPair,
    /// `signup`, `magiclink`, `recovery`... when the service sends it.
    pub link_type: Option<String>,
}

impl DeepLink {
    /// Extract the token pair from a callback URL.
    ///
    /// # Errors
    ///
    /// Returns `DeepLinkError::Rejected` when the link carries an auth error,
    /// `DeepLinkError::MissingTokens` when either token is absent or empty.
    pub fn parse(raw: &str) -> Result<Self, DeepLinkError> {
        let url = Url::parse(raw.trim()).map_err(|e| DeepLinkError::InvalidUrl(e.to_string()))?;

        let params = match url.fragment().filter(|f| !f.is_empty()) {
            Some(fragment) => form_pairs(fragment),
            None => form_pairs(url.query().unwrap_or_default()),
        };
        let get = |name| param(&params, name);

        if let Some(error) = get("error") {
            let description = get("error_description").unwrap_or(error);
            return Err(DeepLinkError::Rejected(description.to_string()));
        }

        match (get("access_token"), get("refresh_token")) {
            (Some(access_token), Some(refresh_token)) => Ok(Self {
                tokens: TokenPair {
                    access_token: access_token.to_string(),
                    refresh_token: refresh_token.to_string(),
                },
                link_type: get("type").map(str::to_string),
            }),
            _ => Err(DeepLinkError::MissingTokens),
        }
    }
}

/// Non-empty value of `name`.
fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn form_pairs(input: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_in_fragment() {
        let link = DeepLink::parse(
            "com.guiacomercial.miapp://auth-callback#access_token=abc.def.ghi&expires_in=3600&refresh_token=r1&token_type=bearer&type=signup",
        )
        .unwrap();
        assert_eq!(link.tokens.access_token, "abc.def.ghi");
        assert_eq!(link.tokens.refresh_token, "r1");
        assert_eq!(link.link_type.as_deref(), Some("signup"));
    }

    #[test]
    fn test_tokens_in_query_fallback() {
        let link =
            DeepLink::parse("com.guiacomercial.miapp://auth-callback?access_token=a&refresh_token=r")
                .unwrap();
        assert_eq!(link.tokens.access_token, "a");
        assert_eq!(link.link_type, None);
    }

    #[test]
    fn test_percent_encoded_values() {
        let link = DeepLink::parse("myapp://cb#access_token=a%2Bb&refresh_token=r%3D").unwrap();
        assert_eq!(link.tokens.access_token, "a+b");
        assert_eq!(link.tokens.refresh_token, "r=");
    }

    #[test]
    fn test_missing_refresh_token() {
        assert_eq!(
            DeepLink::parse("myapp://cb#access_token=a"),
            Err(DeepLinkError::MissingTokens)
        );
        assert_eq!(
            DeepLink::parse("myapp://cb#access_token=a&refresh_token="),
            Err(DeepLinkError::MissingTokens)
        );
        assert_eq!(
            DeepLink::parse("myapp://cb"),
            Err(DeepLinkError::MissingTokens)
        );
    }

    #[test]
    fn test_error_redirect() {
        assert_eq!(
            DeepLink::parse(
                "myapp://cb#error=access_denied&error_code=otp_expired&error_description=Email+link+is+invalid+or+has+expired"
            ),
            Err(DeepLinkError::Rejected(
                "Email link is invalid or has expired".to_string()
            ))
        );
    }

    #[test]
    fn test_not_a_url() {
        assert!(matches!(
            DeepLink::parse("not a url"),
            Err(DeepLinkError::InvalidUrl(_))
        ));
    }
}
