//! Auth types shared by the real client and test doubles.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use guia_comercial_core::{Email, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// An authenticated user as returned by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Auth identity; equals `profiles.id`.
    pub id: UserId,
    /// Email the account signed up with.
    #[serde(default)]
    pub email: Option<String>,
    /// Metadata sent on signup (`{"nombre": ...}`).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Access/refresh token pair plus the user it belongs to.
///
/// Implements `Debug` manually to redact tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds as issued.
    pub expires_in: i64,
    /// Unix timestamp (seconds) after which the access token is rejected.
    pub expires_at: i64,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    /// Owner of the session.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user.id
    }

    /// Whether the access token expires within `margin_secs` of `now`.
    #[must_use]
    pub const fn expires_within(&self, margin_secs: i64, now: i64) -> bool {
        self.expires_at.saturating_sub(margin_secs) <= now
    }

    /// Whether the access token has already expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(0, Utc::now().timestamp())
    }
}

/// Raw token response from the auth service.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: Option<i64>,
    pub user: User,
}

impl TokenResponse {
    pub(super) fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp().saturating_add(self.expires_in));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            expires_at,
            user: self.user,
        }
    }
}

/// Tokens handed over by an email-confirmation or magic-link redirect.
///
/// Implements `Debug` manually to redact tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sign-up
// ─────────────────────────────────────────────────────────────────────────────

/// Account creation request.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: Email,
    pub password: secrecy::SecretString,
    /// Display name, stored as `user_metadata.nombre` and copied into the
    /// profile by the signup trigger.
    pub nombre: String,
    /// Where the confirmation email sends the user back to.
    pub redirect_to: url::Url,
}

/// Result of a sign-up.
///
/// With email confirmation enabled (the normal case) there is no session
/// until the user follows the emailed link.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: User,
    pub session: Option<Session>,
}

impl SignUpOutcome {
    /// Whether the account still has to be confirmed by email.
    #[must_use]
    pub const fn needs_confirmation(&self) -> bool {
        self.session.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth state changes
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of auth state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthChangeEvent {
    /// A session was established (password, deep link, auto-confirmed signup).
    SignedIn,
    /// The session ended (sign-out or unrecoverable refresh failure).
    SignedOut,
    /// Same identity, new tokens.
    TokenRefreshed,
    /// Same identity, updated user record.
    UserUpdated,
}

impl std::fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        };
        f.write_str(name)
    }
}

/// A pushed auth state change: the event and the session after it.
#[derive(Debug, Clone)]
pub struct AuthStateChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}
