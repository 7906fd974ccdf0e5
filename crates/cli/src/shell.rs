//! Mounted app plus terminal output.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

use guia_comercial_app::app::{BackendResult, DeepLinkReceiver};
use guia_comercial_app::pages::Header;
use guia_comercial_app::state::{AppState, Screen};
use guia_comercial_app::storage::PreferencesStore;
use guia_comercial_app::supabase::{Backend, SupabaseClient};
use guia_comercial_app::views::{HeaderView, render_gate};
use guia_comercial_app::{App, AppConfig, AppError, AppHandle, ConfigError};

/// How long to wait for an auth change to reach the state.
const AUTH_WAIT: Duration = Duration::from_secs(15);

/// Exit status when the client is not configured.
pub const EXIT_CONFIG: u8 = 2;

/// Errors that abort a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("Output error: {0}")]
    Io(#[from] io::Error),

    #[error("Render error: {0}")]
    View(#[from] askama::Error),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Client not configured")]
    NotConfigured,
}

/// A mounted app with its background refresher.
pub struct Shell {
    handle: AppHandle,
    redirect_url: Option<Url>,
    refresher: Option<JoinHandle<()>>,
}

impl Shell {
    /// Build the backend, mount the app and wait for the initial session.
    pub async fn start(
        config: Result<AppConfig, ConfigError>,
        deep_links: Option<DeepLinkReceiver>,
    ) -> Self {
        let connection = connect(config);
        let handle = App::mount(connection.backend, deep_links);
        handle.settled().await;

        Self {
            handle,
            redirect_url: connection.redirect_url,
            refresher: connection.refresher,
        }
    }

    /// Rebuild the backend from `config` and bootstrap again from scratch.
    /// The deep-link channel stays attached.
    pub async fn reload(&mut self, config: Result<AppConfig, ConfigError>) {
        if let Some(refresher) = self.refresher.take() {
            refresher.abort();
        }
        let connection = connect(config);
        self.handle.reload(connection.backend).await;
        self.handle.settled().await;
        self.redirect_url = connection.redirect_url;
        self.refresher = connection.refresher;
    }

    /// Whether the configuration error screen is showing.
    #[must_use]
    pub fn is_unconfigured(&self) -> bool {
        matches!(self.handle.state().screen(), Screen::ConfigurationError(_))
    }

    pub const fn handle(&self) -> &AppHandle {
        &self.handle
    }

    /// The backend.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::NotConfigured`] after a configuration error.
    pub fn backend(&self) -> Result<&dyn Backend, CliError> {
        self.handle
            .backend()
            .map(|backend| &**backend)
            .ok_or(CliError::NotConfigured)
    }

    /// Where confirmation emails send the user back to.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::NotConfigured`] after a configuration error.
    pub fn redirect_url(&self) -> Result<&Url, CliError> {
        self.redirect_url.as_ref().ok_or(CliError::NotConfigured)
    }

    /// Print a full-screen state if one is showing. Returns the exit status
    /// to stop with.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn show_gate(&self) -> Result<Option<ExitCode>, CliError> {
        let state = self.handle.state();
        let screen = state.screen();
        let Some(text) = render_gate(&screen)? else {
            return Ok(None);
        };
        self.print(&text)?;
        Ok(match screen {
            Screen::ConfigurationError(_) => Some(ExitCode::from(EXIT_CONFIG)),
            _ => Some(ExitCode::SUCCESS),
        })
    }

    /// Header plus a session summary.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn print_summary(&self, state: &AppState) -> Result<(), CliError> {
        if let Some(text) = render_gate(&state.screen())? {
            self.print(&text)?;
            return Ok(());
        }

        let header = HeaderView {
            header: Header::new(state.session(), state.profile()),
        }
        .render()?;
        self.print(&header)?;

        let session = state
            .session()
            .map_or("ninguna", |s| s.user.email.as_deref().unwrap_or("sin email"));
        self.print(&format!("Sesión: {session}"))?;
        if let Some(profile) = state.profile() {
            self.print(&format!(
                "Perfil: {} ({})",
                profile.nombre, profile.tipo_usuario
            ))?;
        }
        if let Screen::Page(page) = state.screen() {
            self.print(&format!("Página: {}", page.kind()))?;
        }
        Ok(())
    }

    /// Wait until `predicate` holds, for at most the auth timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Timeout`] naming `what` if it never does.
    pub async fn wait_for(
        &self,
        what: &'static str,
        predicate: impl FnMut(&AppState) -> bool,
    ) -> Result<AppState, CliError> {
        tokio::time::timeout(AUTH_WAIT, self.handle.wait_for(predicate))
            .await
            .map_err(|_| CliError::Timeout(what))
    }

    /// Write one block of text to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if stdout is closed.
    pub fn print(&self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", text.trim_end())
    }

    /// Stop the refresher and unmount.
    pub async fn close(self) {
        if let Some(refresher) = self.refresher {
            refresher.abort();
        }
        self.handle.unmount().await;
    }
}

/// Backend built from one configuration load.
struct Connection {
    backend: BackendResult,
    refresher: Option<JoinHandle<()>>,
    redirect_url: Option<Url>,
}

/// Client backed by the preference file, plus its refresher.
fn connect(config: Result<AppConfig, ConfigError>) -> Connection {
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            return Connection {
                backend: Err(e),
                refresher: None,
                redirect_url: None,
            };
        }
    };

    let storage = Arc::new(PreferencesStore::new(config.preferences_path()));
    let (backend, refresher) = match SupabaseClient::new(&config.supabase, storage) {
        Ok(client) => {
            let refresher = client.spawn_auto_refresh();
            let backend: Arc<dyn Backend> = Arc::new(client);
            (Ok(backend), refresher)
        }
        Err(e) => (
            Err(ConfigError::InvalidEnvVar(
                "SUPABASE_URL".to_string(),
                e.to_string(),
            )),
            None,
        ),
    };
    Connection {
        backend,
        refresher,
        redirect_url: Some(config.redirect_url),
    }
}
