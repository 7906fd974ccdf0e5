//! Application-level user profile.
//!
//! Profiles live in the `profiles` table, one row per auth identity, created
//! server-side by a signup trigger from the `nombre` passed as user metadata.
//! The client only ever reads them.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Kind of account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TipoUsuario {
    /// Browses listings.
    #[default]
    Cliente,
    /// Owns and publishes listings.
    Comerciante,
}

impl std::fmt::Display for TipoUsuario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cliente => write!(f, "cliente"),
            Self::Comerciante => write!(f, "comerciante"),
        }
    }
}

impl std::str::FromStr for TipoUsuario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cliente" => Ok(Self::Cliente),
            "comerciante" => Ok(Self::Comerciante),
            _ => Err(format!("invalid tipo_usuario: {s}")),
        }
    }
}

/// A row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same id as the auth identity.
    pub id: UserId,
    /// Display name.
    pub nombre: String,
    /// Account kind.
    pub tipo_usuario: TipoUsuario,
    /// Optional phone number, free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
}

impl Profile {
    /// Whether this account publishes listings.
    #[must_use]
    pub const fn is_comerciante(&self) -> bool {
        matches!(self.tipo_usuario, TipoUsuario::Comerciante)
    }
}
