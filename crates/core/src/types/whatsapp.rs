//! WhatsApp contact number.
//!
//! Listings store the number digits-only so it can be dropped straight into a
//! `https://wa.me/<number>` link. The form accepts anything a user might type
//! (`+54 9 11 2345-6789`) and keeps only the digits.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Base URL for WhatsApp click-to-chat links.
const WA_ME: &str = "https://wa.me/";

/// Errors that can occur when parsing a [`WhatsappNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WhatsappError {
    /// Nothing was entered.
    #[error("El número de WhatsApp es obligatorio.")]
    Empty,
    /// Fewer digits than a full international number.
    #[error("El número de WhatsApp debe tener al menos {min} dígitos.")]
    TooShort {
        /// Digits found after stripping everything else.
        digits: usize,
        /// Minimum required digits.
        min: usize,
    },
}

/// A digits-only WhatsApp number with at least [`WhatsappNumber::MIN_DIGITS`]
/// digits.
///
/// ```
/// use guia_comercial_core::WhatsappNumber;
///
/// let number = WhatsappNumber::parse("+54 9 11 2345-6789").unwrap();
/// assert_eq!(number.as_str(), "5491123456789");
/// assert_eq!(number.chat_link(), "https://wa.me/5491123456789");
///
/// assert!(WhatsappNumber::parse("11 2345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct WhatsappNumber(String);

impl WhatsappNumber {
    /// Minimum number of digits (country code + area code + subscriber).
    pub const MIN_DIGITS: usize = 10;

    /// Strip every non-digit character and validate the remaining length.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsappError::Empty`] for blank input and
    /// [`WhatsappError::TooShort`] when fewer than 10 digits remain.
    pub fn parse(input: &str) -> Result<Self, WhatsappError> {
        if input.trim().is_empty() {
            return Err(WhatsappError::Empty);
        }

        let digits: String = input.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < Self::MIN_DIGITS {
            return Err(WhatsappError::TooShort {
                digits: digits.len(),
                min: Self::MIN_DIGITS,
            });
        }

        Ok(Self(digits))
    }

    /// The stored digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the number and returns the digits.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Click-to-chat link for this number.
    #[must_use]
    pub fn chat_link(&self) -> String {
        chat_link(&self.0)
    }
}

/// Build a click-to-chat link from an already stored number.
///
/// Stored listings are trusted as-is; validation only happens on creation.
#[must_use]
pub fn chat_link(number: &str) -> String {
    format!("{WA_ME}{number}")
}

impl fmt::Display for WhatsappNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WhatsappNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
