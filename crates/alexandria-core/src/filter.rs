//! Equality filter for resource listings.
//!
//! A [`FieldFilter`] is a field → value map. Every pair is an equality
//! constraint and all pairs must hold. Stores validate field names against
//! their own allowlist, so an unknown field fails instead of matching nothing.
//!
//! ```
//! use alexandria_core::FieldFilter;
//!
//! let filter = FieldFilter::new().eq("type", "paper");
//! assert_eq!(filter.get("type"), Some("paper"));
//! assert!(!filter.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conjunction of `field = value` constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldFilter {
    fields: BTreeMap<String, String>,
}

impl FieldFilter {
    /// Empty filter matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an equality constraint.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Constraints in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
