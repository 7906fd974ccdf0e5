//! Application state and its reducer.
//!
//! [`AppState`] is plain data handed to views. It changes only through
//! [`AppState::apply`], driven by one reducer task, so session, profile and
//! page always move together.
//!
//! Profile-carrying updates hold the sequence number of the resolution that
//! produced them. A resolution that started before the last applied one is
//! stale and dropped, so a slow initial profile fetch cannot overwrite a
//! later sign-out.

use tracing::{debug, info};

use guia_comercial_core::{Comercio, Profile};

use crate::config::ConfigError;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::navigation::{NavigationState, Page, PageKind};
use crate::supabase::Session;

/// Ordering token for async session resolutions.
pub type Seq = u64;

/// Everything views need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    session: Option<Session>,
    profile: Option<Profile>,
    loading: bool,
    verifying: bool,
    config_error: Option<ConfigError>,
    navigation: NavigationState,
    last_seq: Seq,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// A state change request.
#[derive(Debug, Clone)]
pub enum Update {
    /// The backend cannot be configured.
    ConfigurationFailed(ConfigError),
    /// Initial resolution done, successful or not.
    InitialLoadFinished,
    /// A deep-link exchange started.
    VerifyingStarted,
    /// A deep-link exchange ended.
    VerifyingFinished,
    /// A session was resolved; `profile` is `None` if its fetch failed.
    Authenticated {
        seq: Seq,
        session: Session,
        profile: Option<Profile>,
    },
    /// Same identity, new tokens or user record.
    SessionRefreshed(Session),
    /// No session anymore.
    SignedOut { seq: Seq },
    /// Go to a page.
    Navigate {
        target: PageKind,
        comercio: Option<Comercio>,
    },
    /// Back to the startup state for a retry from scratch.
    Reset,
}

/// What the shell shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen<'a> {
    /// Full-screen configuration error with a retry.
    ConfigurationError(&'a ConfigError),
    /// Initial resolution in progress.
    Loading,
    /// Deep-link exchange in progress.
    Verifying,
    /// A page.
    Page(Page<'a>),
}

impl AppState {
    /// Startup state: loading, on `Home`, nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
            verifying: false,
            config_error: None,
            navigation: NavigationState::new(),
            last_seq: 0,
        }
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub const fn is_verifying(&self) -> bool {
        self.verifying
    }

    #[must_use]
    pub const fn config_error(&self) -> Option<&ConfigError> {
        self.config_error.as_ref()
    }

    #[must_use]
    pub const fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    /// Neither loading nor verifying.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !self.loading && !self.verifying
    }

    /// Resolve what to show. A configuration error wins over everything,
    /// then loading, then verification.
    #[must_use]
    pub fn screen(&self) -> Screen<'_> {
        if let Some(err) = &self.config_error {
            return Screen::ConfigurationError(err);
        }
        if self.loading {
            return Screen::Loading;
        }
        if self.verifying {
            return Screen::Verifying;
        }
        Screen::Page(Page::resolve(
            &self.navigation,
            self.session.as_ref(),
            self.profile.as_ref(),
        ))
    }

    /// Apply one update. Returns whether anything changed.
    pub fn apply(&mut self, update: Update) -> bool {
        match update {
            Update::ConfigurationFailed(err) => {
                info!(error = %err, "Configuration error");
                self.config_error = Some(err);
                self.loading = false;
                true
            }
            Update::InitialLoadFinished => std::mem::replace(&mut self.loading, false),
            Update::VerifyingStarted => !std::mem::replace(&mut self.verifying, true),
            Update::VerifyingFinished => std::mem::replace(&mut self.verifying, false),
            Update::Authenticated {
                seq,
                session,
                profile,
            } => {
                if self.is_stale(seq) {
                    return false;
                }
                self.last_seq = seq;
                set_sentry_user(session.user_id(), session.user.email.as_deref());
                // A profile only counts for the session it was fetched for.
                let profile = profile.filter(|p| p.id == *session.user_id());
                let complete = profile.is_some();
                self.session = Some(session);
                self.profile = profile;
                self.verifying = false;
                if complete {
                    self.go(PageKind::Dashboard, None);
                }
                true
            }
            Update::SessionRefreshed(session) => match &self.session {
                Some(current) if current.user_id() == session.user_id() => {
                    self.session = Some(session);
                    true
                }
                _ => {
                    debug!("Ignoring refresh for a session that is no longer current");
                    false
                }
            },
            Update::SignedOut { seq } => {
                if self.is_stale(seq) {
                    return false;
                }
                self.last_seq = seq;
                clear_sentry_user();
                self.session = None;
                self.profile = None;
                self.go(PageKind::Home, None);
                true
            }
            Update::Navigate { target, comercio } => {
                self.go(target, comercio);
                true
            }
            Update::Reset => {
                *self = Self {
                    last_seq: self.last_seq,
                    ..Self::new()
                };
                true
            }
        }
    }

    fn is_stale(&self, seq: Seq) -> bool {
        if seq < self.last_seq {
            debug!(seq, last_seq = self.last_seq, "Discarding stale resolution");
            return true;
        }
        false
    }

    fn go(&mut self, target: PageKind, comercio: Option<Comercio>) {
        let id = comercio.as_ref().map(|c| c.id.to_string());
        match &id {
            Some(id) => add_breadcrumb(
                "navigation",
                &target.to_string(),
                Some(&[("comercio_id", id.as_str())]),
            ),
            None => add_breadcrumb("navigation", &target.to_string(), None),
        }
        debug!(page = %target, "Navigate");
        self.navigation.navigate(target, comercio);
    }
}
