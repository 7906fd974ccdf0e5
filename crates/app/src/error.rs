//! Unified error handling with Sentry integration.
//!
//! Each concern has its own error enum; [`AppError`] unifies them for the
//! shell. [`AppError::kind`] tells the shell how to surface an error:
//! full-screen for configuration, logged for session and deep-link failures,
//! inline with the backend's message otherwise. Form validation never
//! reaches here; pages show [`FormError`](crate::pages::FormError) inline.

use thiserror::Error;

use crate::config::ConfigError;
use crate::deep_link::DeepLinkError;
use crate::supabase::SupabaseError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend URL or key missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend call failed.
    #[error("{0}")]
    Backend(#[from] SupabaseError),

    /// Auth callback link unusable.
    #[error("Deep link error: {0}")]
    DeepLink(#[from] DeepLinkError),
}

/// How an error reaches the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Full-screen, retryable.
    Configuration,
    /// Logged; the app continues unauthenticated.
    Session,
    /// Logged; verification ends.
    DeepLink,
    /// Shown inline with the backend's message, not retried.
    Backend,
}

impl AppError {
    /// Category of the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Backend(SupabaseError::Storage(_)) => ErrorKind::Session,
            Self::Backend(_) => ErrorKind::Backend,
            Self::DeepLink(_) => ErrorKind::DeepLink,
        }
    }

    /// Log the error, capturing unexpected ones to Sentry.
    pub fn report(&self) {
        match self.kind() {
            ErrorKind::Session | ErrorKind::Backend => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Application error"
                );
            }
            ErrorKind::Configuration | ErrorKind::DeepLink => {
                tracing::warn!(error = %self, "Application error");
            }
        }
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// ```rust,ignore
/// add_breadcrumb("navigation", "comercio-detail", Some(&[("comercio_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
