//! Domain types for Guía Comercial.
//!
//! Newtypes validate user input once at the edge (`Email`, `WhatsappNumber`)
//! so the rest of the code can assume well-formed values.

pub mod comercio;
pub mod email;
pub mod id;
pub mod profile;
pub mod slug;
pub mod whatsapp;

pub use comercio::{Comercio, NewComercio, PLACEHOLDER_ID, PLACEHOLDER_NAME, or_placeholder};
pub use email::{Email, EmailError};
pub use id::*;
pub use profile::{Profile, TipoUsuario};
pub use slug::slugify;
pub use whatsapp::{WhatsappError, WhatsappNumber, chat_link};
