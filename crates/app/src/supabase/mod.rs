//! Supabase client: managed auth (`/auth/v1`) and the row API (`/rest/v1`).
//!
//! # Architecture
//!
//! - One [`SupabaseClient`] per process, cheap to clone
//! - Session persisted through a [`SessionStorage`] under
//!   `sb-<project-ref>-auth-token`, restored lazily on first use
//! - Every session mutation is persisted, then pushed to
//!   [`AuthSubscription`]s
//! - No caching, no retries: every call is one HTTP request (plus a token
//!   refresh when the session is about to expire)
//!
//! Pages and the bootstrap only see the object-safe [`Backend`] trait so they
//! can run against an in-memory backend in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use guia_comercial_app::supabase::{Order, Select, SupabaseClient};
//!
//! let client = SupabaseClient::new(&config.supabase, storage)?;
//! let session = client.sign_in_with_password(&email, &password).await?;
//! let rows = client
//!     .select(&Select::from("comercios").order("publicidad", Order::Desc))
//!     .await?;
//! ```

mod auth;
mod events;
pub mod jwt;
mod rest;
mod types;

pub use events::{AuthEventBus, AuthSubscription};
pub use rest::{EqFilter, Order, OrderBy, Select};
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue};
use secrecy::SecretString;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error};
use url::Url;

use guia_comercial_core::Email;

use crate::config::SupabaseConfig;
use crate::storage::{SessionStorage, StorageError};

/// Errors that can occur when talking to Supabase.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed (network, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service answered with an error. Displays the service's message.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A single-row read matched nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation needs a session and there is none.
    #[error("Auth session missing")]
    SessionMissing,

    /// A token could not be decoded.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Building a request URL failed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A token or key cannot be sent as a header.
    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),

    /// The session could not be persisted or restored.
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    /// The service answered with something the client does not understand.
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl SupabaseError {
    /// HTTP status of an API error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend trait
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the application needs from the hosted backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current session, refreshed if about to expire.
    async fn get_session(&self) -> Result<Option<Session>, SupabaseError>;

    /// Establish a session from tokens handed over by a deep link.
    async fn set_session(&self, tokens: &TokenPair) -> Result<Session, SupabaseError>;

    /// Email + password sign-in.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, SupabaseError>;

    /// Create an account. Usually requires email confirmation.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, SupabaseError>;

    /// End the session.
    async fn sign_out(&self) -> Result<(), SupabaseError>;

    /// Subscribe to auth state changes.
    fn on_auth_state_change(&self) -> AuthSubscription;

    /// Read rows.
    async fn select(&self, query: &Select) -> Result<Vec<Value>, SupabaseError>;

    /// Insert one row.
    async fn insert(&self, table: &str, row: Value) -> Result<(), SupabaseError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for a Supabase project.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    http: reqwest::Client,
    config: SupabaseConfig,
    storage: Arc<dyn SessionStorage>,
    storage_key: String,
    session: RwLock<Option<Session>>,
    refresh_lock: Mutex<()>,
    events: AuthEventBus,
}

impl SupabaseClient {
    /// Create a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &SupabaseConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, SupabaseError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("guia-comercial/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                http,
                storage_key: config.storage_key(),
                config: config.clone(),
                storage,
                session: RwLock::new(None),
                refresh_lock: Mutex::new(()),
                events: AuthEventBus::new(),
            }),
        })
    }

    /// Key the session is persisted under.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.inner.storage_key
    }

    /// Whether the background refresher should run.
    #[must_use]
    pub fn auto_refresh_enabled(&self) -> bool {
        self.inner.config.auto_refresh_token
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, SupabaseError> {
        Ok(Url::parse(&self.inner.config.endpoint(path))?)
    }

    fn api_key_headers(&self) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(self.inner.config.anon_key())?,
        );
        Ok(headers)
    }

    fn bearer(token: &str) -> Result<HeaderValue, SupabaseError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Fail on non-success statuses, turning the body into `SupabaseError::Api`.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SupabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let err = api_error(status.as_u16(), &text);
        let body = text.chars().take(500).collect::<String>();
        if status.is_server_error() {
            error!(status = %status, error = %err, body = %body, "Supabase request failed");
        } else {
            // Callers decide whether a rejection is worth a warning.
            debug!(status = %status, error = %err, body = %body, "Supabase request rejected");
        }
        Err(err)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SupabaseError> {
        let response = Self::check_status(response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>, SupabaseError> {
        Self::get_session(self).await
    }

    async fn set_session(&self, tokens: &TokenPair) -> Result<Session, SupabaseError> {
        Self::set_session(self, tokens).await
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, SupabaseError> {
        Self::sign_in_with_password(self, email, password).await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, SupabaseError> {
        Self::sign_up(self, request).await
    }

    async fn sign_out(&self) -> Result<(), SupabaseError> {
        Self::sign_out(self).await
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        Self::on_auth_state_change(self)
    }

    async fn select(&self, query: &Select) -> Result<Vec<Value>, SupabaseError> {
        Self::select(self, query).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), SupabaseError> {
        Self::insert(self, table, row).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Union of the auth service's and the row API's error shapes.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<Value>,
    error_code: Option<String>,
}

fn api_error(status: u16, text: &str) -> SupabaseError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();

    let code = body.error_code.or_else(|| match body.code {
        Some(Value::String(code)) => Some(code),
        _ => None,
    });

    let message = body
        .message
        .or(body.msg)
        .or(body.error_description)
        .or(body.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                format!("Request failed with status {status}")
            } else {
                text.trim().to_string()
            }
        });

    SupabaseError::Api {
        status,
        code,
        message,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_rest_body() {
        let err = api_error(
            400,
            r#"{"code":"23502","details":null,"hint":null,"message":"null value in column \"nombre\""}"#,
        );
        assert_eq!(err.to_string(), "null value in column \"nombre\"");
        assert!(matches!(
            err,
            SupabaseError::Api { status: 400, code: Some(ref c), .. } if c == "23502"
        ));
    }

    #[test]
    fn test_api_error_from_auth_body() {
        let err = api_error(
            400,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(matches!(
            err,
            SupabaseError::Api { code: Some(ref c), .. } if c == "invalid_credentials"
        ));
    }

    #[test]
    fn test_api_error_from_oauth_body() {
        let err = api_error(
            400,
            r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#,
        );
        assert_eq!(err.to_string(), "Refresh Token Not Found");
    }

    #[test]
    fn test_api_error_from_plain_text() {
        assert_eq!(api_error(502, "Bad Gateway").to_string(), "Bad Gateway");
        assert_eq!(
            api_error(500, "").to_string(),
            "Request failed with status 500"
        );
        assert_eq!(api_error(500, "").status(), Some(500));
    }
}
