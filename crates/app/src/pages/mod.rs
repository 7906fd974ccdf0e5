//! Page view-models.
//!
//! Each page owns its form/load state, issues its own backend calls through
//! the [`Backend`](crate::supabase::Backend) trait and answers user actions
//! with a [`NavigationRequest`] instead of touching navigation state itself.

pub mod auth;
pub mod business_card;
pub mod comercio_detail;
pub mod create_comercio;
pub mod dashboard;
pub mod header;
pub mod home;

pub use auth::{AuthMode, AuthOutcome, AuthPage};
pub use business_card::BusinessCard;
pub use comercio_detail::ComercioDetailPage;
pub use create_comercio::ComercioForm;
pub use dashboard::DashboardPage;
pub use header::Header;
pub use home::HomePage;

use thiserror::Error;

use guia_comercial_core::{Comercio, EmailError, WhatsappError};

use crate::navigation::PageKind;

/// A page asking the shell to navigate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub target: PageKind,
    pub comercio: Option<Comercio>,
}

impl NavigationRequest {
    /// Go to `target` with nothing selected.
    #[must_use]
    pub const fn to(target: PageKind) -> Self {
        Self {
            target,
            comercio: None,
        }
    }

    /// Open the detail page of `comercio`.
    #[must_use]
    pub fn detail(comercio: Comercio) -> Self {
        Self {
            target: PageKind::ComercioDetail,
            comercio: Some(comercio),
        }
    }
}

/// Progress of a page's data fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Loading,
    Loaded(T),
    /// User-facing message.
    Failed(String),
}

impl<T> LoadState<T> {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Input rejected before any backend call. Displays the inline message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    /// A required listing field is blank.
    #[error("Por favor completa todos los campos obligatorios.")]
    MissingRequired,

    /// WhatsApp number unusable.
    #[error("{0}")]
    Whatsapp(#[from] WhatsappError),

    /// Email unusable.
    #[error("{0}")]
    Email(#[from] EmailError),

    /// Sign-up without a display name.
    #[error("Por favor ingresa tu nombre completo.")]
    MissingNombre,

    /// Blank password.
    #[error("Por favor ingresa tu contraseña.")]
    MissingPassword,

    /// The page needs a signed-in user.
    #[error("Debes iniciar sesión para continuar.")]
    NotSignedIn,
}
