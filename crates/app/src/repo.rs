//! Typed access to the `profiles` and `comercios` tables.
//!
//! Thin wrappers over [`Backend::select`] / [`Backend::insert`]: build the
//! query, decode the rows. Row-level security decides what the caller may
//! see or write.

use serde_json::Value;
use tracing::{debug, instrument};

use guia_comercial_core::{Comercio, ComercioId, NewComercio, Profile, UserId};

use crate::supabase::{Backend, Order, Select, SupabaseError};

/// Profile table name.
pub const PROFILES: &str = "profiles";

/// Listing table name.
pub const COMERCIOS: &str = "comercios";

fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, SupabaseError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(SupabaseError::from))
        .collect()
}

/// Repository for profile reads.
pub struct ProfileRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Get the profile of an auth identity.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::NotFound` if the identity has no profile, or
    /// the backend/parse error.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &UserId) -> Result<Profile, SupabaseError> {
        let query = Select::from(PROFILES).eq("id", id).single();
        let row = self
            .backend
            .select(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SupabaseError::NotFound(format!("profile {id}")))?;
        Ok(serde_json::from_value(row)?)
    }
}

/// Repository for listing reads and inserts.
pub struct ComercioRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ComercioRepository<'a> {
    /// Create a new listing repository.
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Every listing, most prominent first.
    ///
    /// # Errors
    ///
    /// Returns the backend/parse error.
    #[instrument(skip(self))]
    pub async fn list_featured(&self) -> Result<Vec<Comercio>, SupabaseError> {
        let query = Select::from(COMERCIOS).order("publicidad", Order::Desc);
        let comercios: Vec<Comercio> = decode_rows(self.backend.select(&query).await?)?;
        debug!(count = comercios.len(), "Listings loaded");
        Ok(comercios)
    }

    /// Listings owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns the backend/parse error.
    #[instrument(skip(self))]
    pub async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<Comercio>, SupabaseError> {
        let query = Select::from(COMERCIOS).eq("usuario_id", owner);
        let comercios: Vec<Comercio> = decode_rows(self.backend.select(&query).await?)?;
        debug!(count = comercios.len(), "Owner listings loaded");
        Ok(comercios)
    }

    /// One listing by id.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::NotFound` if no listing has that id.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: ComercioId) -> Result<Comercio, SupabaseError> {
        let query = Select::from(COMERCIOS).eq("id", id).single();
        let row = self
            .backend
            .select(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SupabaseError::NotFound(format!("comercio {id}")))?;
        Ok(serde_json::from_value(row)?)
    }

    /// Insert a listing.
    ///
    /// # Errors
    ///
    /// Returns the backend error; its message is what the user sees.
    #[instrument(skip(self, comercio), fields(owner = %comercio.usuario_id))]
    pub async fn create(&self, comercio: &NewComercio) -> Result<(), SupabaseError> {
        let row = serde_json::to_value(comercio)?;
        self.backend.insert(COMERCIOS, row).await
    }
}
