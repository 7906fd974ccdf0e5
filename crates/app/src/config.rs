//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUPABASE_URL` - Project URL (e.g., `https://abcd1234.supabase.co`)
//! - `SUPABASE_ANON_KEY` - Public (anon) API key of the project
//!
//! ## Optional
//! - `GUIA_REDIRECT_URL` - Email confirmation redirect (default:
//!   `com.guiacomercial.miapp://auth-callback`)
//! - `GUIA_DATA_DIR` - Where the session preference file lives (default: the
//!   platform data directory + `guia-comercial`)
//! - `GUIA_AUTO_REFRESH` - Refresh access tokens before they expire (default: true)
//! - `GUIA_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! A missing required variable is not fatal to the process: the bootstrap
//! turns it into the configuration error screen.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Deep link registered by the native shell for email confirmation.
pub const DEFAULT_REDIRECT_URL: &str = "com.guiacomercial.miapp://auth-callback";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DATA_DIR_NAME: &str = "guia-comercial";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Client configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Supabase connection settings
    pub supabase: SupabaseConfig,
    /// Redirect target embedded in confirmation emails
    pub redirect_url: Url,
    /// Directory holding the persisted session
    pub data_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Supabase project settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL
    pub url: Url,
    /// Public anon key, sent as `apikey` on every request
    pub anon_key: SecretString,
    /// Refresh sessions in the background before they expire
    pub auto_refresh_token: bool,
    /// Per-request timeout
    pub http_timeout: Duration,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("auto_refresh_token", &self.auto_refresh_token)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("supabase", &self.supabase)
            .field("redirect_url", &self.redirect_url.as_str())
            .field("data_dir", &self.data_dir)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[SET]"))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let supabase = SupabaseConfig::from_vars(&vars)?;

        let redirect_url = vars.or_default("GUIA_REDIRECT_URL", DEFAULT_REDIRECT_URL);
        let redirect_url = Url::parse(&redirect_url).map_err(|e| {
            ConfigError::InvalidEnvVar("GUIA_REDIRECT_URL".to_string(), e.to_string())
        })?;

        let data_dir = match vars.optional("GUIA_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        Ok(Self {
            supabase,
            redirect_url,
            data_dir,
            sentry_dsn: vars.optional("SENTRY_DSN"),
        })
    }

    /// Path of the preference file holding the persisted session.
    #[must_use]
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }
}

impl SupabaseConfig {
    fn from_vars<F>(vars: &Vars<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = vars.required("SUPABASE_URL")?;
        let url = parse_service_url(&raw_url)?;

        let anon_key = vars.required("SUPABASE_ANON_KEY")?;
        validate_not_placeholder(&anon_key, "SUPABASE_ANON_KEY")?;

        let auto_refresh_token = match vars.or_default("GUIA_AUTO_REFRESH", "true").as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "GUIA_AUTO_REFRESH".to_string(),
                    format!("expected true/false, got {other}"),
                ));
            }
        };

        let timeout_secs = vars
            .or_default(
                "GUIA_HTTP_TIMEOUT_SECS",
                &DEFAULT_HTTP_TIMEOUT_SECS.to_string(),
            )
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("GUIA_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            url,
            anon_key: SecretString::from(anon_key),
            auto_refresh_token,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Short project reference used to namespace the persisted session key
    /// (`abcd1234` for `https://abcd1234.supabase.co`).
    #[must_use]
    pub fn project_ref(&self) -> &str {
        self.url
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or("local")
    }

    /// Storage key under which the session is persisted.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref())
    }

    /// Anon key, for request headers.
    #[must_use]
    pub fn anon_key(&self) -> &str {
        self.anon_key.expose_secret()
    }

    /// Absolute URL of a service path such as `auth/v1/token`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Present and non-blank, or `None`.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }
}

fn parse_service_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidEnvVar("SUPABASE_URL".to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "SUPABASE_URL".to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            "SUPABASE_URL".to_string(),
            "missing host".to_string(),
        ));
    }

    Ok(url)
}

/// Reject keys copied verbatim from an example `.env`.
fn validate_not_placeholder(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .ok_or_else(|| ConfigError::MissingEnvVar("GUIA_DATA_DIR".to_string()))
}
