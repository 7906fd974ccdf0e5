//! Page navigation.
//!
//! [`NavigationState`] is the only place the current page changes, always
//! through [`NavigationState::navigate`]. What actually renders is decided by
//! [`Page::resolve`], which falls back to `Home` whenever the requested page
//! lacks what it needs.

use serde::{Deserialize, Serialize};

use guia_comercial_core::{Comercio, Profile};

use crate::supabase::Session;

/// Named pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageKind {
    #[default]
    Home,
    Auth,
    Dashboard,
    CreateComercio,
    ComercioDetail,
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Home => "home",
            Self::Auth => "auth",
            Self::Dashboard => "dashboard",
            Self::CreateComercio => "create-comercio",
            Self::ComercioDetail => "comercio-detail",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(Self::Home),
            "auth" => Ok(Self::Auth),
            "dashboard" => Ok(Self::Dashboard),
            "create-comercio" => Ok(Self::CreateComercio),
            "comercio-detail" => Ok(Self::ComercioDetail),
            _ => Err(format!("unknown page: {s}")),
        }
    }
}

/// Current page plus the listing it is about, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    current_page: PageKind,
    selected_comercio: Option<Comercio>,
}

impl NavigationState {
    /// Starts on `Home` with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Go to `target`. A listing is remembered only when passed; navigating
    /// without one forgets the previous selection.
    pub fn navigate(&mut self, target: PageKind, comercio: Option<Comercio>) {
        self.current_page = target;
        self.selected_comercio = comercio;
    }

    #[must_use]
    pub const fn current_page(&self) -> PageKind {
        self.current_page
    }

    #[must_use]
    pub const fn selected_comercio(&self) -> Option<&Comercio> {
        self.selected_comercio.as_ref()
    }
}

/// What to render, with everything the page needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page<'a> {
    Home,
    Auth,
    Dashboard {
        session: &'a Session,
        profile: &'a Profile,
    },
    CreateComercio {
        session: &'a Session,
        profile: &'a Profile,
    },
    ComercioDetail(&'a Comercio),
}

impl<'a> Page<'a> {
    /// Resolve the requested page, falling back to `Home` when a detail page
    /// has no listing or an authenticated page has no session and profile.
    #[must_use]
    pub fn resolve(
        navigation: &'a NavigationState,
        session: Option<&'a Session>,
        profile: Option<&'a Profile>,
    ) -> Self {
        match (navigation.current_page(), session, profile) {
            (PageKind::Home, _, _) => Self::Home,
            (PageKind::Auth, _, _) => Self::Auth,
            (PageKind::Dashboard, Some(session), Some(profile)) => {
                Self::Dashboard { session, profile }
            }
            (PageKind::CreateComercio, Some(session), Some(profile)) => {
                Self::CreateComercio { session, profile }
            }
            (PageKind::ComercioDetail, _, _) => navigation
                .selected_comercio()
                .map_or(Self::Home, Self::ComercioDetail),
            (PageKind::Dashboard | PageKind::CreateComercio, _, _) => Self::Home,
        }
    }

    /// The page's name.
    #[must_use]
    pub const fn kind(&self) -> PageKind {
        match self {
            Self::Home => PageKind::Home,
            Self::Auth => PageKind::Auth,
            Self::Dashboard { .. } => PageKind::Dashboard,
            Self::CreateComercio { .. } => PageKind::CreateComercio,
            Self::ComercioDetail(_) => PageKind::ComercioDetail,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{comercio_row, test_session};
    use guia_comercial_core::{TipoUsuario, UserId};

    fn comercio() -> Comercio {
        serde_json::from_value(comercio_row(1, &UserId::random(), "Kiosco", 0)).unwrap()
    }

    fn profile(id: UserId) -> Profile {
        Profile {
            id,
            nombre: "Ana".to_string(),
            tipo_usuario: TipoUsuario::Comerciante,
            telefono: None,
        }
    }

    #[test]
    fn test_initial_state_is_home() {
        let nav = NavigationState::new();
        assert_eq!(nav.current_page(), PageKind::Home);
        assert!(nav.selected_comercio().is_none());
    }

    #[test]
    fn test_navigate_with_entity_stores_it() {
        let mut nav = NavigationState::new();
        let c = comercio();
        nav.navigate(PageKind::ComercioDetail, Some(c.clone()));
        assert_eq!(nav.current_page(), PageKind::ComercioDetail);
        assert_eq!(nav.selected_comercio(), Some(&c));
    }

    #[test]
    fn test_navigate_without_entity_clears_selection() {
        let mut nav = NavigationState::new();
        nav.navigate(PageKind::ComercioDetail, Some(comercio()));
        nav.navigate(PageKind::Auth, None);
        assert_eq!(nav.current_page(), PageKind::Auth);
        assert!(nav.selected_comercio().is_none());
    }

    #[test]
    fn test_detail_without_entity_falls_back_to_home() {
        let mut nav = NavigationState::new();
        nav.navigate(PageKind::ComercioDetail, None);
        assert_eq!(Page::resolve(&nav, None, None), Page::Home);
    }

    #[test]
    fn test_detail_with_entity() {
        let mut nav = NavigationState::new();
        nav.navigate(PageKind::ComercioDetail, Some(comercio()));
        assert!(matches!(
            Page::resolve(&nav, None, None),
            Page::ComercioDetail(c) if c.nombre == "Kiosco"
        ));
    }

    #[test]
    fn test_authenticated_pages_need_session_and_profile() {
        let id = UserId::random();
        let session = test_session(id);
        let profile = profile(id);

        let mut nav = NavigationState::new();
        for target in [PageKind::Dashboard, PageKind::CreateComercio] {
            nav.navigate(target, None);
            assert_eq!(Page::resolve(&nav, None, None), Page::Home);
            assert_eq!(Page::resolve(&nav, Some(&session), None), Page::Home);
            assert_eq!(Page::resolve(&nav, None, Some(&profile)), Page::Home);
            assert_eq!(
                Page::resolve(&nav, Some(&session), Some(&profile)).kind(),
                target
            );
        }
    }

    #[test]
    fn test_page_kind_names() {
        for kind in [
            PageKind::Home,
            PageKind::Auth,
            PageKind::Dashboard,
            PageKind::CreateComercio,
            PageKind::ComercioDetail,
        ] {
            assert_eq!(kind.to_string().parse::<PageKind>().unwrap(), kind);
        }
    }
}
