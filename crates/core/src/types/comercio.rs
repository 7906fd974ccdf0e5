//! Business listings ("comercios").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ComercioId, UserId};
use super::whatsapp::{WhatsappNumber, chat_link};

/// Stored in `*_id` columns when the form left the field empty.
pub const PLACEHOLDER_ID: &str = "default";

/// Stored in `*_nombre` columns when the form left the field empty.
pub const PLACEHOLDER_NAME: &str = "Sin especificar";

/// A row of the `comercios` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comercio {
    pub id: ComercioId,
    /// Owner.
    pub usuario_id: UserId,
    pub nombre: String,
    pub description: String,
    pub direccion: String,
    /// Digits only.
    pub whatsapp: String,
    pub provincia_id: String,
    pub provincia_nombre: String,
    pub ciudad_id: String,
    pub ciudad_nombre: String,
    pub rubro_id: String,
    #[serde(default)]
    pub sub_rubro_id: Option<String>,
    /// Prominence in the public listing, higher first.
    pub publicidad: i32,
    #[serde(default)]
    pub imagen_url: Option<String>,
    #[serde(default)]
    pub gallery_urls: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Comercio {
    /// Primary image followed by the gallery, skipping missing or blank URLs.
    #[must_use]
    pub fn image_urls(&self) -> Vec<&str> {
        self.imagen_url
            .iter()
            .chain(self.gallery_urls.iter().flatten())
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
            .collect()
    }

    /// The primary image, if one is set.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.imagen_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }

    /// `https://wa.me/<whatsapp>` contact link.
    #[must_use]
    pub fn whatsapp_link(&self) -> String {
        chat_link(&self.whatsapp)
    }
}

/// Insert payload for a new listing.
///
/// `id` and `created_at` are assigned by the store. Optional form fields have
/// already been replaced by their placeholders; only `sub_rubro_id` is sent as
/// `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComercio {
    pub usuario_id: UserId,
    pub nombre: String,
    pub description: String,
    pub direccion: String,
    pub whatsapp: WhatsappNumber,
    pub provincia_id: String,
    pub provincia_nombre: String,
    pub ciudad_id: String,
    pub ciudad_nombre: String,
    pub rubro_id: String,
    pub sub_rubro_id: Option<String>,
    pub publicidad: i32,
}

/// `value`, or `placeholder` when `value` is empty.
#[must_use]
pub fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_owned()
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> serde_json::Value {
        serde_json::json!({
            "id": 12,
            "usuario_id": "7b0f0a8e-3a55-4b1c-9f54-0c8d2f1e9a11",
            "nombre": "Panadería El Buen Pan",
            "description": "Pan casero",
            "direccion": "Calle 7 1234",
            "whatsapp": "5492215551234",
            "provincia_id": "buenos-aires",
            "provincia_nombre": "Buenos Aires",
            "ciudad_id": "la-plata",
            "ciudad_nombre": "La Plata",
            "rubro_id": "alimentos",
            "sub_rubro_id": null,
            "publicidad": 50,
            "imagen_url": "https://cdn.example.com/a.jpg",
            "gallery_urls": ["https://cdn.example.com/b.jpg", ""],
            "created_at": "2024-05-01T12:30:00.123456+00:00"
        })
    }

    #[test]
    fn test_deserialize_store_row() {
        let comercio: Comercio = serde_json::from_value(row()).unwrap();
        assert_eq!(comercio.id, ComercioId::new(12));
        assert_eq!(comercio.publicidad, 50);
        assert_eq!(comercio.sub_rubro_id, None);
    }

    #[test]
    fn test_deserialize_without_optional_columns() {
        let mut value = row();
        let obj = value.as_object_mut().unwrap();
        obj.remove("imagen_url");
        obj.remove("gallery_urls");
        obj.remove("sub_rubro_id");
        let comercio: Comercio = serde_json::from_value(value).unwrap();
        assert!(comercio.image_urls().is_empty());
        assert_eq!(comercio.primary_image(), None);
    }

    #[test]
    fn test_image_urls_primary_then_gallery() {
        let comercio: Comercio = serde_json::from_value(row()).unwrap();
        assert_eq!(
            comercio.image_urls(),
            vec!["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.jpg"]
        );
    }

    #[test]
    fn test_whatsapp_link() {
        let comercio: Comercio = serde_json::from_value(row()).unwrap();
        assert_eq!(comercio.whatsapp_link(), "https://wa.me/5492215551234");
    }

    #[test]
    fn test_new_comercio_sends_null_sub_rubro() {
        let new = NewComercio {
            usuario_id: UserId::random(),
            nombre: "Kiosco".to_string(),
            description: "Golosinas".to_string(),
            direccion: "Av. 1".to_string(),
            whatsapp: WhatsappNumber::parse("1123456789").unwrap(),
            provincia_id: or_placeholder("", PLACEHOLDER_ID),
            provincia_nombre: or_placeholder("", PLACEHOLDER_NAME),
            ciudad_id: PLACEHOLDER_ID.to_string(),
            ciudad_nombre: PLACEHOLDER_NAME.to_string(),
            rubro_id: PLACEHOLDER_ID.to_string(),
            sub_rubro_id: None,
            publicidad: 0,
        };
        let json = serde_json::to_value(&new).unwrap();
        assert_eq!(json["sub_rubro_id"], serde_json::Value::Null);
        assert_eq!(json["whatsapp"], "1123456789");
        assert_eq!(json["provincia_id"], "default");
        assert_eq!(json["provincia_nombre"], "Sin especificar");
        assert!(json.get("id").is_none());
    }
}
