//! The signed-in owner's listings.

use tracing::{error, instrument};

use guia_comercial_core::Comercio;

use super::NavigationRequest;
use crate::navigation::PageKind;
use crate::repo::ComercioRepository;
use crate::supabase::{Backend, Session};

/// Dashboard page state.
///
/// A failed fetch is logged and shows as an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardPage {
    loading: bool,
    comercios: Vec<Comercio>,
}

impl Default for DashboardPage {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardPage {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            loading: true,
            comercios: Vec::new(),
        }
    }

    /// Fetch the listings owned by the session user.
    #[instrument(skip_all, fields(user_id = %session.user_id()))]
    pub async fn load(&mut self, backend: &dyn Backend, session: &Session) {
        self.loading = true;
        self.comercios = match ComercioRepository::new(backend)
            .list_by_owner(session.user_id())
            .await
        {
            Ok(comercios) => comercios,
            Err(e) => {
                error!(error = %e, "Error fetching user comercios");
                Vec::new()
            }
        };
        self.loading = false;
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn comercios(&self) -> &[Comercio] {
        &self.comercios
    }

    /// "+ Crear Nuevo Comercio".
    #[must_use]
    pub const fn create_request(&self) -> NavigationRequest {
        NavigationRequest::to(PageKind::CreateComercio)
    }

    /// "Ver Detalles" on the listing at `index`.
    #[must_use]
    pub fn select(&self, index: usize) -> Option<NavigationRequest> {
        self.comercios
            .get(index)
            .map(|c| NavigationRequest::detail(c.clone()))
    }
}
