//! Public listing, most prominent first.

use tracing::{error, instrument};

use guia_comercial_core::Comercio;

use super::{BusinessCard, LoadState, NavigationRequest};
use crate::repo::ComercioRepository;
use crate::supabase::Backend;

/// Shown when the listing cannot be loaded.
pub const LOAD_ERROR: &str = "No se pudieron cargar los comercios. Intente más tarde.";

/// Home page state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomePage {
    comercios: LoadState<Vec<Comercio>>,
}

impl Default for HomePage {
    fn default() -> Self {
        Self::new()
    }
}

impl HomePage {
    /// Not yet loaded.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            comercios: LoadState::Loading,
        }
    }

    /// Fetch every listing ordered by `publicidad` descending.
    #[instrument(skip_all)]
    pub async fn load(&mut self, backend: &dyn Backend) {
        self.comercios = LoadState::Loading;
        self.comercios = match ComercioRepository::new(backend).list_featured().await {
            Ok(comercios) => LoadState::Loaded(comercios),
            Err(e) => {
                error!(error = %e, "Error fetching comercios");
                LoadState::Failed(LOAD_ERROR.to_string())
            }
        };
    }

    #[must_use]
    pub const fn state(&self) -> &LoadState<Vec<Comercio>> {
        &self.comercios
    }

    /// Loaded and nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comercios.loaded().is_some_and(Vec::is_empty)
    }

    /// Cards for the loaded listings.
    #[must_use]
    pub fn cards(&self) -> Vec<BusinessCard<'_>> {
        self.comercios
            .loaded()
            .map(|comercios| comercios.iter().map(BusinessCard::new).collect())
            .unwrap_or_default()
    }

    /// Open the listing at `index`.
    #[must_use]
    pub fn select(&self, index: usize) -> Option<NavigationRequest> {
        self.comercios
            .loaded()
            .and_then(|comercios| comercios.get(index))
            .map(|c| NavigationRequest::detail(c.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::navigation::PageKind;
    use crate::repo::COMERCIOS;
    use crate::testing::{FakeBackend, comercio_row};
    use guia_comercial_core::UserId;

    #[tokio::test]
    async fn test_load_orders_by_publicidad() {
        let owner = UserId::random();
        let backend = FakeBackend::new()
            .with_row(COMERCIOS, comercio_row(1, &owner, "Diez", 10))
            .with_row(COMERCIOS, comercio_row(2, &owner, "Noventa", 90))
            .with_row(COMERCIOS, comercio_row(3, &owner, "Cincuenta", 50));

        let mut page = HomePage::new();
        assert!(page.state().is_loading());
        page.load(&backend).await;

        let names: Vec<&str> = page.cards().iter().map(|c| c.nombre()).collect();
        assert_eq!(names, vec!["Noventa", "Cincuenta", "Diez"]);
    }

    #[tokio::test]
    async fn test_load_failure_shows_message() {
        let backend = FakeBackend::new();
        backend.fail_selects(Some("connection refused"));

        let mut page = HomePage::new();
        page.load(&backend).await;
        assert_eq!(page.state().error(), Some(LOAD_ERROR));
        assert!(page.cards().is_empty());
        assert!(!page.is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let mut page = HomePage::new();
        page.load(&FakeBackend::new()).await;
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_select_opens_detail() {
        let owner = UserId::random();
        let backend = FakeBackend::new().with_row(COMERCIOS, comercio_row(4, &owner, "Kiosco", 0));
        let mut page = HomePage::new();
        page.load(&backend).await;

        let request = page.select(0).unwrap();
        assert_eq!(request.target, PageKind::ComercioDetail);
        assert_eq!(request.comercio.unwrap().nombre, "Kiosco");
        assert!(page.select(1).is_none());
    }
}
