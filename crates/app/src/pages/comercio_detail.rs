//! Full view of one listing.

use guia_comercial_core::Comercio;

use super::NavigationRequest;
use crate::navigation::PageKind;

/// Main image when a listing has none.
pub const DETAIL_PLACEHOLDER: &str = "https://via.placeholder.com/800x600.png?text=Sin+Imagen";

/// Detail page state: the listing plus which gallery image is enlarged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComercioDetailPage {
    comercio: Comercio,
    selected_image: usize,
}

impl ComercioDetailPage {
    #[must_use]
    pub const fn new(comercio: Comercio) -> Self {
        Self {
            comercio,
            selected_image: 0,
        }
    }

    #[must_use]
    pub const fn comercio(&self) -> &Comercio {
        &self.comercio
    }

    /// Primary image followed by the gallery.
    #[must_use]
    pub fn images(&self) -> Vec<&str> {
        self.comercio.image_urls()
    }

    /// The enlarged image, or the placeholder.
    #[must_use]
    pub fn main_image(&self) -> &str {
        self.images()
            .get(self.selected_image)
            .copied()
            .unwrap_or(DETAIL_PLACEHOLDER)
    }

    /// Enlarge the thumbnail at `index`. Out-of-range indexes are ignored.
    pub fn select_image(&mut self, index: usize) {
        if index < self.images().len() {
            self.selected_image = index;
        }
    }

    /// Thumbnails are only shown for more than one image.
    #[must_use]
    pub fn has_gallery(&self) -> bool {
        self.images().len() > 1
    }

    /// "Direccion, Ciudad".
    #[must_use]
    pub fn address_line(&self) -> String {
        format!(
            "{}, {}",
            self.comercio.direccion, self.comercio.ciudad_nombre
        )
    }

    /// "Contactar por WhatsApp" target.
    #[must_use]
    pub fn whatsapp_link(&self) -> String {
        self.comercio.whatsapp_link()
    }

    /// "← Volver a la Guía".
    #[must_use]
    pub const fn back(&self) -> NavigationRequest {
        NavigationRequest::to(PageKind::Home)
    }
}
