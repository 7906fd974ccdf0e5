//! In-memory [`Backend`] for tests.
//!
//! Evaluates [`Select`] filters and ordering over JSON rows, records inserts,
//! keeps a session and pushes the same auth events the real client does.
//! Failure switches turn individual operations into backend errors.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use guia_comercial_core::{Email, UserId};

use crate::supabase::{
    AuthChangeEvent, AuthEventBus, AuthSubscription, Backend, Order, Select, Session,
    SignUpOutcome, SignUpRequest, SupabaseError, TokenPair, User,
};

struct Account {
    email: String,
    password: String,
    user: User,
}

#[derive(Default)]
struct FakeState {
    tables: BTreeMap<String, Vec<Value>>,
    accounts: Vec<Account>,
    session: Option<Session>,
    accepted_tokens: BTreeMap<String, User>,
    inserts: Vec<(String, Value)>,
    selects: Vec<Select>,
    delays: BTreeMap<String, Duration>,
    fail_selects: Option<String>,
    fail_inserts: Option<String>,
    fail_get_session: Option<String>,
    fail_sign_out: Option<String>,
    auto_confirm: bool,
    sign_ups: Vec<(String, String)>,
}

/// In-memory backend.
pub struct FakeBackend {
    state: Mutex<FakeState>,
    events: AuthEventBus,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// Empty tables, no accounts, no session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            events: AuthEventBus::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding
    // ─────────────────────────────────────────────────────────────────────────

    /// Seed a row.
    #[must_use]
    pub fn with_row(self, table: &str, row: Value) -> Self {
        self.add_row(table, row);
        self
    }

    /// Add a row after construction.
    pub fn add_row(&self, table: &str, row: Value) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Register an account that can sign in with `email` / `password`.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, id: UserId) -> Self {
        self.state().accounts.push(Account {
            email: email.to_string(),
            password: password.to_string(),
            user: test_user(id, email),
        });
        self
    }

    /// Start with `session` as the stored session.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        self.state().session = Some(session);
        self
    }

    /// Accept `access_token` in [`Backend::set_session`] as belonging to `id`.
    #[must_use]
    pub fn accepting_tokens(self, access_token: &str, id: UserId) -> Self {
        self.state()
            .accepted_tokens
            .insert(access_token.to_string(), test_user(id, "deeplink@example.com"));
        self
    }

    /// Sign-ups return a session immediately instead of waiting for email
    /// confirmation.
    #[must_use]
    pub fn auto_confirming(self) -> Self {
        self.state().auto_confirm = true;
        self
    }

    /// Delay every read of `table`.
    pub fn delay_table(&self, table: &str, delay: Duration) {
        self.state().delays.insert(table.to_string(), delay);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Failure switches
    // ─────────────────────────────────────────────────────────────────────────

    /// Every read fails with `message`; `None` restores reads.
    pub fn fail_selects(&self, message: Option<&str>) {
        self.state().fail_selects = message.map(str::to_string);
    }

    /// Every insert fails with `message`; `None` restores inserts.
    pub fn fail_inserts(&self, message: Option<&str>) {
        self.state().fail_inserts = message.map(str::to_string);
    }

    /// Session retrieval fails with `message`; `None` restores it.
    pub fn fail_get_session(&self, message: Option<&str>) {
        self.state().fail_get_session = message.map(str::to_string);
    }

    /// Sign-out fails with `message`; `None` restores it.
    pub fn fail_sign_out(&self, message: Option<&str>) {
        self.state().fail_sign_out = message.map(str::to_string);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Every insert, in order.
    #[must_use]
    pub fn inserts(&self) -> Vec<(String, Value)> {
        self.state().inserts.clone()
    }

    /// Number of reads issued against `table`.
    #[must_use]
    pub fn select_count(&self, table: &str) -> usize {
        self.state()
            .selects
            .iter()
            .filter(|s| s.table() == table)
            .count()
    }

    /// Emails that signed up, with the display name they sent.
    #[must_use]
    pub fn sign_ups(&self) -> Vec<(String, String)> {
        self.state().sign_ups.clone()
    }

    /// Current session.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.state().session.clone()
    }

    /// Push an auth change to subscribers without touching the session.
    pub fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        self.events.emit(event, session);
    }

    /// Live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    fn establish(&self, session: Session) -> Session {
        self.state().session = Some(session.clone());
        self.events.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        session
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_session(&self) -> Result<Option<Session>, SupabaseError> {
        let state = self.state();
        if let Some(message) = &state.fail_get_session {
            return Err(api_error(500, message));
        }
        Ok(state.session.clone())
    }

    async fn set_session(&self, tokens: &TokenPair) -> Result<Session, SupabaseError> {
        let user = self
            .state()
            .accepted_tokens
            .get(&tokens.access_token)
            .cloned()
            .ok_or_else(|| api_error(401, "Invalid JWT"))?;
        let mut session = test_session(user.id);
        session.access_token.clone_from(&tokens.access_token);
        session.refresh_token.clone_from(&tokens.refresh_token);
        session.user = user;
        Ok(self.establish(session))
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, SupabaseError> {
        let user = self
            .state()
            .accounts
            .iter()
            .find(|a| a.email == email.as_str() && a.password == password.expose_secret())
            .map(|a| a.user.clone())
            .ok_or_else(|| api_error(400, "Invalid login credentials"))?;
        let mut session = test_session(user.id);
        session.user = user;
        Ok(self.establish(session))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, SupabaseError> {
        let (auto_confirm, user) = {
            let mut state = self.state();
            if state
                .accounts
                .iter()
                .any(|a| a.email == request.email.as_str())
            {
                return Err(api_error(422, "User already registered"));
            }
            let mut user = test_user(UserId::random(), request.email.as_str());
            user.user_metadata = json!({"nombre": request.nombre});
            state.accounts.push(Account {
                email: request.email.as_str().to_string(),
                password: request.password.expose_secret().to_string(),
                user: user.clone(),
            });
            state
                .sign_ups
                .push((request.email.as_str().to_string(), request.nombre.clone()));
            (state.auto_confirm, user)
        };

        if !auto_confirm {
            return Ok(SignUpOutcome {
                user,
                session: None,
            });
        }

        let mut session = test_session(user.id);
        session.user = user.clone();
        Ok(SignUpOutcome {
            user,
            session: Some(self.establish(session)),
        })
    }

    async fn sign_out(&self) -> Result<(), SupabaseError> {
        {
            let mut state = self.state();
            if let Some(message) = &state.fail_sign_out {
                return Err(api_error(500, message));
            }
            state.session = None;
        }
        self.events.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn select(&self, query: &Select) -> Result<Vec<Value>, SupabaseError> {
        let delay = {
            let mut state = self.state();
            state.selects.push(query.clone());
            state.delays.get(query.table()).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if let Some(message) = &state.fail_selects {
            return Err(api_error(500, message));
        }

        let mut rows: Vec<Value> = state
            .tables
            .get(query.table())
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query
                            .filters()
                            .iter()
                            .all(|f| row.get(&f.column).is_some_and(|v| as_text(v) == f.value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            query
                .ordering()
                .iter()
                .map(|o| {
                    let ord = compare(a.get(&o.column), b.get(&o.column));
                    match o.direction {
                        Order::Asc => ord,
                        Order::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        if query.is_single() {
            return match rows.len() {
                0 => Err(SupabaseError::NotFound(query.table().to_string())),
                1 => Ok(rows),
                n => Err(api_error(
                    406,
                    &format!("JSON object requested, multiple ({n}) rows returned"),
                )),
            };
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), SupabaseError> {
        let mut state = self.state();
        if let Some(message) = &state.fail_inserts {
            return Err(api_error(400, message));
        }
        state.inserts.push((table.to_string(), row.clone()));
        state.tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }
}

fn api_error(status: u16, message: &str) -> SupabaseError {
    SupabaseError::Api {
        status,
        code: None,
        message: message.to_string(),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => as_text(x).cmp(&as_text(y)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

/// A user with the given id and email.
#[must_use]
pub fn test_user(id: UserId, email: &str) -> User {
    User {
        id,
        email: Some(email.to_string()),
        user_metadata: Value::Null,
    }
}

/// A session for `id` valid for an hour.
#[must_use]
pub fn test_session(id: UserId) -> Session {
    Session {
        access_token: format!("access-{id}"),
        refresh_token: format!("refresh-{id}"),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Utc::now().timestamp() + 3600,
        user: test_user(id, "ana@example.com"),
    }
}

/// A `profiles` row.
#[must_use]
pub fn profile_row(id: &UserId, nombre: &str, tipo_usuario: &str) -> Value {
    json!({
        "id": id.to_string(),
        "nombre": nombre,
        "tipo_usuario": tipo_usuario,
        "telefono": null
    })
}

/// A `comercios` row.
#[must_use]
pub fn comercio_row(id: i64, owner: &UserId, nombre: &str, publicidad: i32) -> Value {
    json!({
        "id": id,
        "usuario_id": owner.to_string(),
        "nombre": nombre,
        "description": format!("Descripción de {nombre}"),
        "direccion": "Av. Siempreviva 742",
        "whatsapp": "5491123456789",
        "provincia_id": "buenos-aires",
        "provincia_nombre": "Buenos Aires",
        "ciudad_id": "la-plata",
        "ciudad_nombre": "La Plata",
        "rubro_id": "alimentos",
        "sub_rubro_id": null,
        "publicidad": publicidad,
        "imagen_url": null,
        "gallery_urls": null,
        "created_at": "2024-05-01T12:30:00+00:00"
    })
}
