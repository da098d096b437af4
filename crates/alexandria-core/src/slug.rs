//! Tag name canonicalization.
//!
//! A tag's display name is stored in kebab-case slug form and doubles as the
//! tag's natural key, so every entry point that accepts a tag name runs it
//! through [`slugify`] first.

use crate::defaults::TAG_NAME_MAX_LEN;
use crate::error::{Error, Result};

/// Convert free text into a lowercase, hyphen-separated slug.
///
/// Word boundaries are any non-alphanumeric character, a lower-to-upper case
/// change (`machineLearning`), and the end of an acronym (`HTTPServer`).
///
/// ```
/// use alexandria_core::slug::slugify;
///
/// assert_eq!(slugify("Machine Learning"), "machine-learning");
/// assert_eq!(slugify("machine-learning"), "machine-learning");
/// assert_eq!(slugify("HTTPServer"), "http-server");
/// ```
pub fn slugify(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let camel = prev.is_lowercase() || prev.is_numeric();
            let acronym_end = prev.is_uppercase() && next_is_lower;
            if camel || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }

        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }

    words.join("-")
}

/// Slugify a tag name and check the result is usable as a natural key.
pub fn canonical_tag_name(input: &str) -> Result<String> {
    let slug = slugify(input);
    if slug.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Tag name '{}' has no alphanumeric characters",
            input
        )));
    }
    if slug.chars().count() > TAG_NAME_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "Tag name must be {} characters or less",
            TAG_NAME_MAX_LEN
        )));
    }
    Ok(slug)
}
