//! Equality filter query builder for document listings.
//!
//! Translates a [`FieldFilter`] into a parameterized WHERE clause fragment.
//! Field names are checked against a fixed column allowlist; values are only
//! ever bound, never interpolated.

use uuid::Uuid;

use alexandria_core::{DocumentKind, Error, FieldFilter, Result};

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Single UUID parameter.
    Uuid(Uuid),
    /// String parameter.
    String(String),
}

/// Filterable document fields and the column each maps to.
const DOCUMENT_COLUMNS: &[(&str, &str)] = &[
    ("id", "d.id"),
    ("name", "d.name"),
    ("display_name", "d.display_name"),
    ("path", "d.path"),
    ("type", "d.type"),
    ("description", "d.description"),
];

/// Generates a WHERE clause fragment for a document [`FieldFilter`].
///
/// ```rust,ignore
/// let filter = FieldFilter::new().eq("type", "paper");
/// let (sql, params) = FieldFilterQueryBuilder::new(&filter, 0).build()?;
/// // sql: "d.type = $1"
/// // params: [QueryParam::String("paper")]
/// ```
pub struct FieldFilterQueryBuilder<'a> {
    filter: &'a FieldFilter,
    param_offset: usize,
}

impl<'a> FieldFilterQueryBuilder<'a> {
    /// `param_offset` is the number of parameters already in the query.
    pub fn new(filter: &'a FieldFilter, param_offset: usize) -> Self {
        Self {
            filter,
            param_offset,
        }
    }

    /// Build the clause. An empty filter yields `("TRUE", [])`.
    pub fn build(&self) -> Result<(String, Vec<QueryParam>)> {
        let mut clauses = Vec::with_capacity(self.filter.len());
        let mut params = Vec::with_capacity(self.filter.len());

        for (field, value) in self.filter.iter() {
            let column = column_for(field)?;
            params.push(param_for(field, value)?);
            clauses.push(format!("{} = ${}", column, self.param_offset + params.len()));
        }

        if clauses.is_empty() {
            return Ok(("TRUE".to_string(), params));
        }
        Ok((clauses.join(" AND "), params))
    }
}

fn column_for(field: &str) -> Result<&'static str> {
    DOCUMENT_COLUMNS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, column)| *column)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown filter field: {}", field)))
}

fn param_for(field: &str, value: &str) -> Result<QueryParam> {
    match field {
        "id" => Uuid::parse_str(value)
            .map(QueryParam::Uuid)
            .map_err(|_| Error::InvalidInput(format!("Invalid id filter value: {}", value))),
        "type" => value
            .parse::<DocumentKind>()
            .map(|kind| QueryParam::String(kind.as_str().to_string()))
            .map_err(|_| Error::InvalidInput(format!("Invalid type filter value: {}", value))),
        _ => Ok(QueryParam::String(value.to_string())),
    }
}
