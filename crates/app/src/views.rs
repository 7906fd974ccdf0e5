//! Text views for the shell.
//!
//! One askama template per screen. Page views include `header.txt`, so each
//! carries the [`Header`] for the current user.

use askama::Template;

use crate::config::ConfigError;
use crate::pages::{
    AuthMode, AuthPage, ComercioDetailPage, ComercioForm, DashboardPage, Header, HomePage,
    LoadState,
};
use crate::state::Screen;

/// Shown while the initial session resolves.
pub const LOADING: &str = "Cargando Guía Comercial...";

/// Shown while a deep link is exchanged for a session.
pub const VERIFYING: &str = "Verificando tu cuenta...";

/// Loading and verifying screens.
#[derive(Template)]
#[template(path = "loading.txt")]
pub struct LoadingView {
    pub message: &'static str,
}

/// Full-screen configuration error.
#[derive(Template)]
#[template(path = "config_error.txt")]
pub struct ConfigErrorView<'a> {
    pub error: &'a ConfigError,
}

/// The top bar alone.
#[derive(Template)]
#[template(path = "header.txt")]
pub struct HeaderView<'a> {
    pub header: Header<'a>,
}

#[derive(Template)]
#[template(path = "home.txt")]
pub struct HomeView<'a> {
    pub header: Header<'a>,
    pub page: &'a HomePage,
}

#[derive(Template)]
#[template(path = "auth.txt")]
pub struct AuthView<'a> {
    pub header: Header<'a>,
    pub page: &'a AuthPage,
}

#[derive(Template)]
#[template(path = "dashboard.txt")]
pub struct DashboardView<'a> {
    pub header: Header<'a>,
    pub page: &'a DashboardPage,
}

#[derive(Template)]
#[template(path = "create_comercio.txt")]
pub struct CreateComercioView<'a> {
    pub header: Header<'a>,
    pub form: &'a ComercioForm,
}

#[derive(Template)]
#[template(path = "comercio_detail.txt")]
pub struct ComercioDetailView<'a> {
    pub header: Header<'a>,
    pub page: &'a ComercioDetailPage,
}

/// Render the screens that replace every page: configuration error, loading
/// and verifying. Returns `None` when `screen` is a page.
///
/// # Errors
///
/// Returns the template error if rendering fails.
pub fn render_gate(screen: &Screen<'_>) -> askama::Result<Option<String>> {
    let rendered = match *screen {
        Screen::ConfigurationError(error) => ConfigErrorView { error }.render()?,
        Screen::Loading => LoadingView { message: LOADING }.render()?,
        Screen::Verifying => LoadingView { message: VERIFYING }.render()?,
        Screen::Page(_) => return Ok(None),
    };
    Ok(Some(rendered))
}
