//! Session lifecycle against the auth service (`/auth/v1`).

use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use guia_comercial_core::Email;

use super::events::AuthSubscription;
use super::jwt::decode_claims;
use super::types::{
    AuthChangeEvent, Session, SignUpOutcome, SignUpRequest, TokenPair, TokenResponse, User,
};
use super::{SupabaseClient, SupabaseError};

/// Sessions this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Background refresher period.
const AUTO_REFRESH_TICK: Duration = Duration::from_secs(30);

/// Refresh when the session expires within this many ticks.
const AUTO_REFRESH_TICK_THRESHOLD: i64 = 3;

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpData<'a>,
}

#[derive(Serialize)]
struct SignUpData<'a> {
    nombre: &'a str,
}

impl SupabaseClient {
    // ─────────────────────────────────────────────────────────────────────────
    // Session retrieval
    // ─────────────────────────────────────────────────────────────────────────

    /// Current session, restored from storage on first use and refreshed when
    /// it expires within a few seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the refresh is rejected. A
    /// rejected refresh also signs the user out.
    pub async fn get_session(&self) -> Result<Option<Session>, SupabaseError> {
        let Some(session) = self.current_or_restored().await? else {
            return Ok(None);
        };

        if session.expires_within(EXPIRY_MARGIN_SECS, Utc::now().timestamp()) {
            debug!("Session about to expire, refreshing");
            return self.refresh_with(&session.refresh_token).await.map(Some);
        }

        Ok(Some(session))
    }

    /// Refresh the current session now.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::SessionMissing` without a session, or the
    /// service error if the refresh is rejected.
    pub async fn refresh_session(&self) -> Result<Session, SupabaseError> {
        let session = self
            .current_or_restored()
            .await?
            .ok_or(SupabaseError::SessionMissing)?;
        self.refresh_with(&session.refresh_token).await
    }

    async fn current_or_restored(&self) -> Result<Option<Session>, SupabaseError> {
        if let Some(session) = self.inner.session.read().await.clone() {
            return Ok(Some(session));
        }

        let Some(raw) = self.inner.storage.get_item(&self.inner.storage_key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => {
                debug!(user_id = %session.user.id, "Session restored from storage");
                *self.inner.session.write().await = Some(session.clone());
                Ok(Some(session))
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored session");
                self.inner
                    .storage
                    .remove_item(&self.inner.storage_key)
                    .await?;
                Ok(None)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sign-in / sign-up
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the service message (e.g. "Invalid login credentials") as
    /// `SupabaseError::Api`.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, SupabaseError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .inner
            .http
            .post(url)
            .headers(self.api_key_headers()?)
            .json(&PasswordGrant {
                email: email.as_str(),
                password: password.expose_secret(),
            })
            .send()
            .await?;

        let session = Self::read_json::<TokenResponse>(response)
            .await?
            .into_session();
        self.save_session(&session).await?;
        info!(user_id = %session.user.id, "Signed in");
        self.inner
            .events
            .emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Create an account. The display name travels as user metadata and the
    /// confirmation email links back to `request.redirect_to`.
    ///
    /// # Errors
    ///
    /// Returns the service message (e.g. "User already registered") as
    /// `SupabaseError::Api`.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, SupabaseError> {
        let mut url = self.endpoint("auth/v1/signup")?;
        url.query_pairs_mut().append_pair("redirect_to", request.redirect_to.as_str());

        let response = self
            .inner
            .http
            .post(url)
            .headers(self.api_key_headers()?)
            .json(&SignUpBody {
                email: request.email.as_str(),
                password: request.password.expose_secret(),
                data: SignUpData {
                    nombre: &request.nombre,
                },
            })
            .send()
            .await?;

        let body = Self::read_json::<Value>(response).await?;

        // Auto-confirming projects answer with a session, the rest with the
        // bare user.
        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<TokenResponse>(body)?.into_session();
            self.save_session(&session).await?;
            info!(user_id = %session.user.id, "Signed up with immediate session");
            self.inner
                .events
                .emit(AuthChangeEvent::SignedIn, Some(session.clone()));
            return Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user = serde_json::from_value::<User>(body)?;
        info!(user_id = %user.id, "Signed up, confirmation pending");
        Ok(SignUpOutcome {
            user,
            session: None,
        })
    }

    /// Establish a session from a token pair (deep-link callback).
    ///
    /// An expired access token is exchanged using the refresh token; a live
    /// one is validated by loading its user.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::InvalidToken` for undecodable tokens, or the
    /// service error if the tokens are rejected.
    #[instrument(skip(self, tokens))]
    pub async fn set_session(&self, tokens: &TokenPair) -> Result<Session, SupabaseError> {
        let claims = decode_claims(&tokens.access_token)?;
        let now = Utc::now().timestamp();

        let session = match claims.exp {
            Some(exp) if exp.saturating_sub(EXPIRY_MARGIN_SECS) > now => {
                let user = self.get_user(&tokens.access_token).await?;
                Session {
                    access_token: tokens.access_token.clone(),
                    refresh_token: tokens.refresh_token.clone(),
                    token_type: "bearer".to_string(),
                    expires_in: exp.saturating_sub(now),
                    expires_at: exp,
                    user,
                }
            }
            _ => {
                debug!("Handed-over access token expired, refreshing");
                self.request_refresh(&tokens.refresh_token).await?
            }
        };

        self.save_session(&session).await?;
        info!(user_id = %session.user.id, "Session established from tokens");
        self.inner
            .events
            .emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Load the user an access token belongs to.
    ///
    /// # Errors
    ///
    /// Returns the service error if the token is rejected.
    pub async fn get_user(&self, access_token: &str) -> Result<User, SupabaseError> {
        let mut headers = self.api_key_headers()?;
        headers.insert("Authorization", Self::bearer(access_token)?);

        let response = self
            .inner
            .http
            .get(self.endpoint("auth/v1/user")?)
            .headers(headers)
            .send()
            .await?;
        Self::read_json(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sign-out
    // ─────────────────────────────────────────────────────────────────────────

    /// Revoke the session server-side and forget it locally.
    ///
    /// A session the server no longer knows (401/403/404) still signs out
    /// locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or storage fails; the
    /// local session is kept in the first case.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), SupabaseError> {
        if let Some(session) = self.current_or_restored().await? {
            let mut headers = self.api_key_headers()?;
            headers.insert("Authorization", Self::bearer(&session.access_token)?);

            let response = self
                .inner
                .http
                .post(self.endpoint("auth/v1/logout")?)
                .headers(headers)
                .send()
                .await?;

            match Self::check_status(response).await {
                Ok(_) => {}
                Err(SupabaseError::Api {
                    status: 401 | 403 | 404,
                    ..
                }) => debug!("Session already gone server-side"),
                Err(e) => return Err(e),
            }
        }

        self.remove_session().await?;
        info!("Signed out");
        self.inner.events.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    /// Subscribe to auth state changes.
    #[must_use]
    pub fn on_auth_state_change(&self) -> AuthSubscription {
        self.inner.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────────

    /// Refresh, persist and announce. A rejected refresh token ends the
    /// session.
    async fn refresh_with(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let _guard = self.inner.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(current) = self.inner.session.read().await.clone()
            && current.refresh_token != refresh_token
            && !current.expires_within(EXPIRY_MARGIN_SECS, Utc::now().timestamp())
        {
            return Ok(current);
        }

        match self.request_refresh(refresh_token).await {
            Ok(session) => {
                self.save_session(&session).await?;
                info!(user_id = %session.user.id, "Session refreshed");
                self.inner
                    .events
                    .emit(AuthChangeEvent::TokenRefreshed, Some(session.clone()));
                Ok(session)
            }
            Err(e @ SupabaseError::Api { .. }) => {
                warn!(error = %e, "Refresh rejected, signing out");
                self.remove_session().await?;
                self.inner.events.emit(AuthChangeEvent::SignedOut, None);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .inner
            .http
            .post(url)
            .headers(self.api_key_headers()?)
            .json(&RefreshGrant { refresh_token })
            .send()
            .await?;

        Ok(Self::read_json::<TokenResponse>(response)
            .await?
            .into_session())
    }

    /// Start the background refresher, if enabled.
    ///
    /// Every tick, a session expiring within three ticks is refreshed.
    /// Failures are logged; a rejected refresh token signs the user out.
    #[must_use]
    pub fn spawn_auto_refresh(&self) -> Option<JoinHandle<()>> {
        if !self.auto_refresh_enabled() {
            return None;
        }

        let client = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(AUTO_REFRESH_TICK);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                client.auto_refresh_tick().await;
            }
        }))
    }

    async fn auto_refresh_tick(&self) {
        let session = match self.current_or_restored().await {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Auto-refresh could not read the session");
                return;
            }
        };

        let threshold = AUTO_REFRESH_TICK_THRESHOLD * AUTO_REFRESH_TICK.as_secs().cast_signed();
        if !session.expires_within(threshold, Utc::now().timestamp()) {
            return;
        }

        if let Err(e) = self.refresh_with(&session.refresh_token).await {
            warn!(error = %e, "Auto-refresh failed");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    async fn save_session(&self, session: &Session) -> Result<(), SupabaseError> {
        let raw = serde_json::to_string(session)?;
        self.inner
            .storage
            .set_item(&self.inner.storage_key, &raw)
            .await?;
        *self.inner.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn remove_session(&self) -> Result<(), SupabaseError> {
        *self.inner.session.write().await = None;
        self.inner
            .storage
            .remove_item(&self.inner.storage_key)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::config::SupabaseConfig;
    use crate::storage::{MemoryStorage, SessionStorage};

    fn config() -> SupabaseConfig {
        SupabaseConfig {
            url: Url::parse("https://abcdefgh.supabase.co").unwrap(),
            anon_key: SecretString::from("anon-key".to_string()),
            auto_refresh_token: false,
            http_timeout: Duration::from_secs(5),
        }
    }

    fn stored_session(expires_at: i64) -> String {
        serde_json::json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": expires_at,
            "user": {
                "id": "7b0f0a8e-3a55-4b1c-9f54-0c8d2f1e9a11",
                "email": "ana@example.com"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_no_stored_session() {
        let client = SupabaseClient::new(&config(), Arc::new(MemoryStorage::new())).unwrap();
        assert!(client.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restores_valid_session_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let expires_at = Utc::now().timestamp() + 3600;
        storage
            .set_item("sb-abcdefgh-auth-token", &stored_session(expires_at))
            .await
            .unwrap();

        let client = SupabaseClient::new(&config(), storage).unwrap();
        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.expires_at, expires_at);
        assert_eq!(session.user.email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn test_unreadable_stored_session_is_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item("sb-abcdefgh-auth-token", "{not json")
            .await
            .unwrap();

        let client = SupabaseClient::new(&config(), storage.clone()).unwrap();
        assert!(client.get_session().await.unwrap().is_none());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_session_rejects_garbage_token() {
        let client = SupabaseClient::new(&config(), Arc::new(MemoryStorage::new())).unwrap();
        let err = client
            .set_session(&TokenPair {
                access_token: "garbage".to_string(),
                refresh_token: "refresh".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SupabaseError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let client = SupabaseClient::new(&config(), Arc::new(MemoryStorage::new())).unwrap();
        assert!(matches!(
            client.refresh_session().await,
            Err(SupabaseError::SessionMissing)
        ));
    }

    #[test]
    fn test_auto_refresh_disabled() {
        let client = SupabaseClient::new(&config(), Arc::new(MemoryStorage::new())).unwrap();
        assert!(client.spawn_auto_refresh().is_none());
    }

    // =========================================================================
    // Against a local auth service
    // =========================================================================

    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::DEFAULT_REDIRECT_URL;
    use crate::supabase::jwt::tests::token_with;

    async fn client_for(server: &MockServer) -> (SupabaseClient, Arc<MemoryStorage>) {
        let config = SupabaseConfig {
            url: Url::parse(&server.uri()).unwrap(),
            ..config()
        };
        let storage = Arc::new(MemoryStorage::new());
        let client = SupabaseClient::new(&config, storage.clone()).unwrap();
        (client, storage)
    }

    async fn store_session(client: &SupabaseClient, storage: &MemoryStorage, expires_at: i64) {
        storage
            .set_item(client.storage_key(), &stored_session(expires_at))
            .await
            .unwrap();
    }

    fn user_body() -> Value {
        serde_json::json!({
            "id": "7b0f0a8e-3a55-4b1c-9f54-0c8d2f1e9a11",
            "email": "ana@example.com"
        })
    }

    fn token_body(access_token: &str) -> Value {
        serde_json::json!({
            "access_token": access_token,
            "refresh_token": "new-refresh",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": Utc::now().timestamp() + 3600,
            "user": user_body()
        })
    }

    fn invalid_grant() -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Refresh Token Not Found"
        }))
    }

    #[tokio::test]
    async fn test_sign_out_when_server_forgot_session() {
        for status in [401, 403, 404] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/auth/v1/logout"))
                .and(header("authorization", "Bearer access"))
                .respond_with(ResponseTemplate::new(status))
                .expect(1)
                .mount(&server)
                .await;

            let (client, storage) = client_for(&server).await;
            store_session(&client, &storage, Utc::now().timestamp() + 3600).await;
            let mut events = client.on_auth_state_change();

            client.sign_out().await.unwrap();
            assert!(storage.is_empty().await, "status {status}");
            assert_eq!(
                events.recv().await.unwrap().event,
                AuthChangeEvent::SignedOut
            );
        }
    }

    #[tokio::test]
    async fn test_sign_out_keeps_session_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (client, storage) = client_for(&server).await;
        store_session(&client, &storage, Utc::now().timestamp() + 3600).await;

        let err = client.sign_out().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_stored_session_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_partial_json(serde_json::json!({ "refresh_token": "refresh" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("new-access")))
            .expect(1)
            .mount(&server)
            .await;

        let (client, storage) = client_for(&server).await;
        store_session(&client, &storage, Utc::now().timestamp() - 60).await;
        let mut events = client.on_auth_state_change();

        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "new-access");
        assert_eq!(session.refresh_token, "new-refresh");

        let stored = storage
            .get_item(client.storage_key())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.contains("new-access"));
        assert_eq!(
            events.recv().await.unwrap().event,
            AuthChangeEvent::TokenRefreshed
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(invalid_grant())
            .expect(1)
            .mount(&server)
            .await;

        let (client, storage) = client_for(&server).await;
        store_session(&client, &storage, Utc::now().timestamp() - 60).await;
        let mut events = client.on_auth_state_change();

        let err = client.get_session().await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(storage.is_empty().await);
        assert_eq!(
            events.recv().await.unwrap().event,
            AuthChangeEvent::SignedOut
        );
    }

    #[tokio::test]
    async fn test_sign_up_sends_redirect_and_nombre() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(query_param("redirect_to", DEFAULT_REDIRECT_URL))
            .and(header("apikey", "anon-key"))
            .and(body_partial_json(serde_json::json!({
                "email": "nuevo@example.com",
                "password": "secreto",
                "data": { "nombre": "Juan Pérez" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
            .expect(1)
            .mount(&server)
            .await;

        let (client, storage) = client_for(&server).await;
        let outcome = client
            .sign_up(&SignUpRequest {
                email: Email::parse("nuevo@example.com").unwrap(),
                password: SecretString::from("secreto".to_string()),
                nombre: "Juan Pérez".to_string(),
                redirect_to: Url::parse(DEFAULT_REDIRECT_URL).unwrap(),
            })
            .await
            .unwrap();

        assert!(outcome.session.is_none());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_session_with_live_token_loads_user() {
        let server = MockServer::start().await;
        let expires_at = Utc::now().timestamp() + 3600;
        let token = token_with(&serde_json::json!({ "exp": expires_at }));
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
            .expect(1)
            .mount(&server)
            .await;

        let (client, storage) = client_for(&server).await;
        let session = client
            .set_session(&TokenPair {
                access_token: token.clone(),
                refresh_token: "r".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.access_token, token);
        assert_eq!(session.expires_at, expires_at);
        assert!((3590..=3600).contains(&session.expires_in));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_session_with_overflowing_expiry_refreshes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(invalid_grant())
            .expect(1)
            .mount(&server)
            .await;

        let (client, storage) = client_for(&server).await;
        let err = client
            .set_session(&TokenPair {
                access_token: token_with(&serde_json::json!({ "exp": i64::MIN })),
                refresh_token: "r".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert!(storage.is_empty().await);
    }
}
