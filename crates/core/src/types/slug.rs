//! Slug ids for provinces and cities.
//!
//! Locations are free text in the listing form; the store keeps a slug id next
//! to the display name so listings can later be grouped by location.

/// Lower-case `name` and replace every run of whitespace with a single `-`.
///
/// Leading and trailing whitespace are not trimmed: they become a leading or
/// trailing hyphen, matching what is already stored for existing listings.
///
/// ```
/// use guia_comercial_core::slugify;
///
/// assert_eq!(slugify("Buenos Aires"), "buenos-aires");
/// assert_eq!(slugify("San  Miguel de\tTucumán"), "san-miguel-de-tucumán");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
        } else {
            slug.extend(c.to_lowercase());
            in_whitespace = false;
        }
    }

    slug
}
