//! Listing card used by the home page.

use guia_comercial_core::Comercio;

/// Card image when a listing has none.
pub const CARD_PLACEHOLDER: &str = "https://via.placeholder.com/400x300.png?text=Sin+Imagen";

/// Summary of one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCard<'a> {
    comercio: &'a Comercio,
}

impl<'a> BusinessCard<'a> {
    #[must_use]
    pub const fn new(comercio: &'a Comercio) -> Self {
        Self { comercio }
    }

    #[must_use]
    pub fn nombre(&self) -> &'a str {
        &self.comercio.nombre
    }

    /// Primary image or the placeholder.
    #[must_use]
    pub fn image_url(&self) -> &'a str {
        self.comercio.primary_image().unwrap_or(CARD_PLACEHOLDER)
    }

    /// "Ciudad, Provincia".
    #[must_use]
    pub fn location(&self) -> String {
        format!(
            "{}, {}",
            self.comercio.ciudad_nombre, self.comercio.provincia_nombre
        )
    }

    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.comercio.description
    }

    #[must_use]
    pub const fn comercio(&self) -> &'a Comercio {
        self.comercio
    }
}
