//! Session bootstrap and the application runtime.
//!
//! [`App::mount`] wires the backend to the state:
//!
//! 1. a reducer task, the only writer of [`AppState`], publishing snapshots
//!    through a `watch` channel;
//! 2. the auth-state subscription, opened before anything else so no change
//!    is missed, turning auth events into state updates;
//! 3. the deep-link listener, exchanging callback tokens for a session while
//!    the UI shows the verifying screen;
//! 4. the initial session resolution, which always ends loading.
//!
//! Everything except the reducer runs in a `JoinSet` aborted on
//! [`AppHandle::unmount`] and on [`AppHandle::reload`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use guia_comercial_core::{Comercio, Profile};

use crate::config::ConfigError;
use crate::deep_link::DeepLink;
use crate::error::AppError;
use crate::navigation::PageKind;
use crate::pages::NavigationRequest;
use crate::repo::ProfileRepository;
use crate::state::{AppState, Seq, Update};
use crate::supabase::{AuthChangeEvent, AuthStateChange, AuthSubscription, Backend, Session};

/// The backend, or why it could not be built.
pub type BackendResult = Result<Arc<dyn Backend>, ConfigError>;

/// Deep-link URLs forwarded by the shell.
pub type DeepLinkReceiver = mpsc::Receiver<String>;

/// `update: None` is a barrier: acknowledged once everything queued before
/// it is applied.
struct Command {
    update: Option<Update>,
    applied: Option<oneshot::Sender<()>>,
}

type CommandSender = mpsc::UnboundedSender<Command>;

fn send(tx: &CommandSender, update: Update) {
    if tx
        .send(Command {
            update: Some(update),
            applied: None,
        })
        .is_err()
    {
        debug!("State reducer gone, dropping update");
    }
}

/// Entry point.
pub struct App;

impl App {
    /// Start the runtime. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn mount(backend: BackendResult, deep_links: Option<DeepLinkReceiver>) -> AppHandle {
        let (state_tx, state_rx) = watch::channel(AppState::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let reducer = tokio::spawn(reduce(rx, state_tx));

        let mut handle = AppHandle {
            backend: None,
            commands: tx,
            state: state_rx,
            seq: Arc::new(AtomicU64::new(0)),
            deep_links: deep_links.map(|rx| Arc::new(Mutex::new(rx))),
            tasks: JoinSet::new(),
            reducer,
        };
        handle.bootstrap(backend);
        handle
    }
}

async fn reduce(mut rx: mpsc::UnboundedReceiver<Command>, state: watch::Sender<AppState>) {
    while let Some(Command { update, applied }) = rx.recv().await {
        if let Some(update) = update {
            state.send_if_modified(|s| s.apply(update));
        }
        if let Some(applied) = applied {
            let _ = applied.send(());
        }
    }
    debug!("State reducer stopped");
}

/// Handle to a mounted app.
pub struct AppHandle {
    backend: Option<Arc<dyn Backend>>,
    commands: CommandSender,
    state: watch::Receiver<AppState>,
    seq: Arc<AtomicU64>,
    deep_links: Option<Arc<Mutex<DeepLinkReceiver>>>,
    tasks: JoinSet<()>,
    reducer: JoinHandle<()>,
}

impl AppHandle {
    fn bootstrap(&mut self, backend: BackendResult) {
        let backend = match backend {
            Ok(backend) => backend,
            Err(err) => {
                AppError::from(err.clone()).report();
                self.backend = None;
                send(&self.commands, Update::ConfigurationFailed(err));
                return;
            }
        };
        self.backend = Some(Arc::clone(&backend));

        let runtime = Runtime {
            backend,
            commands: self.commands.clone(),
            seq: Arc::clone(&self.seq),
        };

        // Subscribe before resolving so a change racing the initial read is
        // still seen.
        let subscription = runtime.backend.on_auth_state_change();
        self.tasks.spawn(runtime.clone().listen_auth_changes(subscription));

        if let Some(deep_links) = &self.deep_links {
            self.tasks.spawn(runtime.clone().listen_deep_links(Arc::clone(deep_links)));
        }

        self.tasks.spawn(runtime.resolve_initial_session());
    }

    /// Latest state snapshot.
    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.clone()
    }

    /// Backend, unless configuration failed.
    #[must_use]
    pub fn backend(&self) -> Option<&Arc<dyn Backend>> {
        self.backend.as_ref()
    }

    /// Go to `target`, with a listing for the detail page. Resolves once the
    /// navigation is applied.
    pub async fn navigate(&self, target: PageKind, comercio: Option<Comercio>) {
        self.apply(Update::Navigate { target, comercio }).await;
    }

    /// Carry out a page's navigation request.
    pub async fn follow(&self, request: NavigationRequest) {
        self.navigate(request.target, request.comercio).await;
    }

    async fn apply(&self, update: Update) {
        self.acked(Some(update)).await;
    }

    /// Resolves once every update queued so far is applied.
    pub async fn sync(&self) {
        self.acked(None).await;
    }

    async fn acked(&self, update: Option<Update>) {
        let (applied_tx, applied_rx) = oneshot::channel();
        let command = Command {
            update,
            applied: Some(applied_tx),
        };
        if self.commands.send(command).is_ok() {
            let _ = applied_rx.await;
        }
    }

    /// Wait until neither loading nor verifying.
    pub async fn settled(&self) -> AppState {
        self.wait_for(AppState::is_settled).await
    }

    /// Wait until `predicate` holds for the state.
    pub async fn wait_for(&self, predicate: impl FnMut(&AppState) -> bool) -> AppState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(predicate).await {
            return state.clone();
        }
        // Reducer gone; nothing will change anymore.
        rx.borrow().clone()
    }

    /// Exchange a deep link now instead of through the listener. On return
    /// the state is either still verifying, awaiting the sign-in event, or
    /// settled after a failure.
    pub async fn open_url(&self, url: &str) {
        if let Some(backend) = &self.backend {
            let runtime = Runtime {
                backend: Arc::clone(backend),
                commands: self.commands.clone(),
                seq: Arc::clone(&self.seq),
            };
            runtime.exchange_deep_link(url).await;
            self.sync().await;
        }
    }

    /// Retry from scratch: abort in-flight work, reset the state and
    /// bootstrap again with a freshly built backend.
    #[instrument(skip_all)]
    pub async fn reload(&mut self, backend: BackendResult) {
        info!("Reloading");
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        self.apply(Update::Reset).await;
        self.bootstrap(backend);
    }

    /// Tear down: stop listening for deep links and auth changes, then stop
    /// the reducer.
    pub async fn unmount(mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        self.deep_links = None;
        self.backend = None;
        drop(self.commands);
        if let Err(e) = self.reducer.await {
            warn!(error = %e, "State reducer ended abnormally");
        }
        debug!("App unmounted");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Background work
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Runtime {
    backend: Arc<dyn Backend>,
    commands: CommandSender,
    seq: Arc<AtomicU64>,
}

/// Ends loading however the initial resolution exits, abort included.
struct FinishInitialLoad(CommandSender);

impl Drop for FinishInitialLoad {
    fn drop(&mut self) {
        send(&self.0, Update::InitialLoadFinished);
    }
}

/// Ends verification when a deep-link exchange fails, panics or is aborted.
/// Disarmed on success, where the sign-in event ends it.
struct FinishVerifying(Option<CommandSender>);

impl FinishVerifying {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for FinishVerifying {
    fn drop(&mut self) {
        if let Some(commands) = &self.0 {
            send(commands, Update::VerifyingFinished);
        }
    }
}

impl Runtime {
    fn next_seq(&self) -> Seq {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn fetch_profile(&self, session: &Session) -> Option<Profile> {
        match ProfileRepository::new(self.backend.as_ref())
            .get_by_id(session.user_id())
            .await
        {
            Ok(profile) => Some(profile),
            Err(e) => {
                AppError::from(e).report();
                None
            }
        }
    }

    async fn authenticate(&self, session: Session) {
        let seq = self.next_seq();
        let profile = self.fetch_profile(&session).await;
        send(
            &self.commands,
            Update::Authenticated {
                seq,
                session,
                profile,
            },
        );
    }

    #[instrument(skip_all)]
    async fn resolve_initial_session(self) {
        let _finish = FinishInitialLoad(self.commands.clone());

        match self.backend.get_session().await {
            Ok(Some(session)) => {
                info!(user_id = %session.user.id, "Existing session found");
                self.authenticate(session).await;
            }
            Ok(None) => debug!("No existing session"),
            Err(e) => AppError::from(e).report(),
        }
    }

    #[instrument(skip_all)]
    async fn listen_auth_changes(self, mut subscription: AuthSubscription) {
        while let Some(AuthStateChange { event, session }) = subscription.recv().await {
            debug!(%event, "Auth state change");
            match (event, session) {
                (AuthChangeEvent::SignedIn, Some(session)) => self.authenticate(session).await,
                (AuthChangeEvent::TokenRefreshed | AuthChangeEvent::UserUpdated, Some(session)) => {
                    send(&self.commands, Update::SessionRefreshed(session));
                }
                (_, None) => {
                    let seq = self.next_seq();
                    send(&self.commands, Update::SignedOut { seq });
                }
                (AuthChangeEvent::SignedOut, Some(_)) => {
                    warn!("Sign-out event carried a session, treating as signed out");
                    let seq = self.next_seq();
                    send(&self.commands, Update::SignedOut { seq });
                }
            }
        }
        debug!("Auth subscription closed");
    }

    #[instrument(skip_all)]
    async fn listen_deep_links(self, deep_links: Arc<Mutex<DeepLinkReceiver>>) {
        let mut deep_links = deep_links.lock().await;
        while let Some(url) = deep_links.recv().await {
            // A failed exchange must not take the listener down with it.
            let mut exchange = JoinSet::new();
            let runtime = self.clone();
            exchange.spawn(async move { runtime.exchange_deep_link(&url).await });
            if let Some(Err(e)) = exchange.join_next().await {
                warn!(error = %e, "Deep-link exchange ended abnormally");
            }
        }
        debug!("Deep-link channel closed");
    }

    /// Exchange a callback URL for a session. Success is completed by the
    /// resulting sign-in event; every failure ends verification here.
    async fn exchange_deep_link(&self, url: &str) {
        let link = match DeepLink::parse(url) {
            Ok(link) => link,
            Err(e) => {
                AppError::from(e).report();
                send(&self.commands, Update::VerifyingFinished);
                return;
            }
        };

        info!(link_type = ?link.link_type, "Exchanging deep-link tokens");
        send(&self.commands, Update::VerifyingStarted);
        let finish = FinishVerifying(Some(self.commands.clone()));
        match self.backend.set_session(&link.tokens).await {
            Ok(_) => finish.disarm(),
            Err(e) => AppError::from(e).report(),
        }
    }
}
