//! New listing form.

use tracing::{error, info, instrument, warn};

use guia_comercial_core::{
    NewComercio, PLACEHOLDER_ID, PLACEHOLDER_NAME, WhatsappNumber, or_placeholder, slugify,
};

use super::{FormError, NavigationRequest};
use crate::error::add_breadcrumb;
use crate::navigation::PageKind;
use crate::repo::ComercioRepository;
use crate::supabase::{Backend, Session, SupabaseError};

/// Shown when the store rejects the insert without a message.
pub const CREATE_FAILED: &str = "Error al crear el comercio. Intenta nuevamente.";

/// Shown when the insert fails for any reason other than a store rejection.
pub const UNEXPECTED: &str = "Ocurrió un error inesperado. Intenta nuevamente.";

/// Create-listing form state. Every field holds the raw text as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComercioForm {
    pub nombre: String,
    pub description: String,
    pub direccion: String,
    pub whatsapp: String,
    pub provincia_id: String,
    pub provincia_nombre: String,
    pub ciudad_id: String,
    pub ciudad_nombre: String,
    pub rubro_id: String,
    pub sub_rubro_id: String,
    pub publicidad: String,
    error: Option<String>,
}

impl ComercioForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the province name and derive its id.
    pub fn set_provincia(&mut self, nombre: impl Into<String>) {
        self.provincia_nombre = nombre.into();
        self.provincia_id = slugify(&self.provincia_nombre);
    }

    /// Set the city name and derive its id.
    pub fn set_ciudad(&mut self, nombre: impl Into<String>) {
        self.ciudad_nombre = nombre.into();
        self.ciudad_id = slugify(&self.ciudad_nombre);
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Build the insert payload for `session`'s user.
    ///
    /// Text is trimmed. Blank optional fields get their placeholders and an
    /// unparseable `publicidad` counts as 0.
    ///
    /// # Errors
    ///
    /// [`FormError::MissingRequired`] if nombre, description, direccion or
    /// whatsapp is blank, [`FormError::Whatsapp`] if the number has fewer
    /// than 10 digits.
    pub fn validate(&self, session: &Session) -> Result<NewComercio, FormError> {
        let required = [
            &self.nombre,
            &self.description,
            &self.direccion,
            &self.whatsapp,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(FormError::MissingRequired);
        }
        let whatsapp = WhatsappNumber::parse(self.whatsapp.trim())?;

        let sub_rubro_id = self.sub_rubro_id.trim();
        Ok(NewComercio {
            usuario_id: *session.user_id(),
            nombre: self.nombre.trim().to_string(),
            description: self.description.trim().to_string(),
            direccion: self.direccion.trim().to_string(),
            whatsapp,
            provincia_id: or_placeholder(self.provincia_id.trim(), PLACEHOLDER_ID),
            provincia_nombre: or_placeholder(self.provincia_nombre.trim(), PLACEHOLDER_NAME),
            ciudad_id: or_placeholder(self.ciudad_id.trim(), PLACEHOLDER_ID),
            ciudad_nombre: or_placeholder(self.ciudad_nombre.trim(), PLACEHOLDER_NAME),
            rubro_id: or_placeholder(self.rubro_id.trim(), PLACEHOLDER_ID),
            sub_rubro_id: (!sub_rubro_id.is_empty()).then(|| sub_rubro_id.to_string()),
            publicidad: self.publicidad.trim().parse().unwrap_or(0),
        })
    }

    /// Validate and insert. Returns the dashboard request on success;
    /// otherwise the message is in [`ComercioForm::error`].
    #[instrument(skip_all, fields(user_id = %session.user_id()))]
    pub async fn submit(
        &mut self,
        backend: &dyn Backend,
        session: &Session,
    ) -> Option<NavigationRequest> {
        self.error = None;

        let comercio = match self.validate(session) {
            Ok(comercio) => comercio,
            Err(e) => {
                self.error = Some(e.to_string());
                return None;
            }
        };

        match ComercioRepository::new(backend).create(&comercio).await {
            Ok(()) => {
                info!(nombre = %comercio.nombre, "Comercio created");
                add_breadcrumb(
                    "comercio",
                    "Created listing",
                    Some(&[("nombre", comercio.nombre.as_str())]),
                );
                Some(NavigationRequest::to(PageKind::Dashboard))
            }
            Err(e) => {
                self.error = Some(insert_error_message(&e));
                None
            }
        }
    }

    /// "← Volver al Panel".
    #[must_use]
    pub const fn back(&self) -> NavigationRequest {
        NavigationRequest::to(PageKind::Dashboard)
    }
}

fn insert_error_message(e: &SupabaseError) -> String {
    match e {
        SupabaseError::Api { message, .. } => {
            warn!(error = %e, "Insert rejected");
            if message.trim().is_empty() {
                CREATE_FAILED.to_string()
            } else {
                message.clone()
            }
        }
        _ => {
            error!(error = %e, "Insert failed");
            UNEXPECTED.to_string()
        }
    }
}
