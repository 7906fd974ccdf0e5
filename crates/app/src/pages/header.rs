//! Top bar shown above every page.

use tracing::{instrument, warn};

use guia_comercial_core::Profile;

use super::NavigationRequest;
use crate::navigation::PageKind;
use crate::supabase::{Backend, Session};

/// Site title.
pub const TITLE: &str = "🇦🇷 Guía Comercial";

/// Header view of the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    session: Option<&'a Session>,
    profile: Option<&'a Profile>,
}

impl<'a> Header<'a> {
    #[must_use]
    pub const fn new(session: Option<&'a Session>, profile: Option<&'a Profile>) -> Self {
        Self { session, profile }
    }

    /// Signed in with a loaded profile.
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.session.is_some() && self.profile.is_some()
    }

    /// "Hola, {nombre}" when signed in.
    #[must_use]
    pub fn greeting(&self) -> Option<String> {
        match (self.session, self.profile) {
            (Some(_), Some(profile)) => Some(format!("Hola, {}", profile.nombre)),
            _ => None,
        }
    }

    /// Title click.
    #[must_use]
    pub const fn home(&self) -> NavigationRequest {
        NavigationRequest::to(PageKind::Home)
    }

    /// "Mi Panel" when signed in, "Acceder / Registrarse" otherwise.
    #[must_use]
    pub const fn account(&self) -> NavigationRequest {
        if self.is_signed_in() {
            NavigationRequest::to(PageKind::Dashboard)
        } else {
            NavigationRequest::to(PageKind::Auth)
        }
    }

    /// "Salir": sign out and go home. A failed sign-out is only logged.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, backend: &dyn Backend) -> NavigationRequest {
        if let Err(e) = backend.sign_out().await {
            warn!(error = %e, "Sign-out failed");
        }
        NavigationRequest::to(PageKind::Home)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, profile_row, test_session};
    use guia_comercial_core::UserId;

    #[test]
    fn test_signed_out_header() {
        let header = Header::new(None, None);
        assert!(header.greeting().is_none());
        assert_eq!(header.account().target, PageKind::Auth);
    }

    #[test]
    fn test_session_without_profile_is_signed_out() {
        let session = test_session(UserId::random());
        let header = Header::new(Some(&session), None);
        assert!(!header.is_signed_in());
        assert_eq!(header.account().target, PageKind::Auth);
    }

    #[test]
    fn test_signed_in_header() {
        let id = UserId::random();
        let session = test_session(id);
        let profile: Profile =
            serde_json::from_value(profile_row(&id, "Ana", "comerciante")).unwrap();
        let header = Header::new(Some(&session), Some(&profile));
        assert_eq!(header.greeting().as_deref(), Some("Hola, Ana"));
        assert_eq!(header.account().target, PageKind::Dashboard);
    }

    #[tokio::test]
    async fn test_sign_out_goes_home_even_on_failure() {
        let id = UserId::random();
        let backend = FakeBackend::new().with_session(test_session(id));
        backend.fail_sign_out(Some("network down"));

        let session = test_session(id);
        let request = Header::new(Some(&session), None).sign_out(&backend).await;
        assert_eq!(request.target, PageKind::Home);
    }
}
