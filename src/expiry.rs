use chrono::NaiveDate;
use tracing::trace;

use crate::dates::parse_date;
use crate::documents::{Document, find_column, value_of};

/// Decides which documents are past their end date.
#[derive(Debug, Clone)]
pub struct ExpiryPolicy {
    field_names: Vec<String>,
}

impl ExpiryPolicy {
    pub fn new(field_names: Vec<String>) -> Self {
        Self { field_names }
    }

    /// The derived column holding the expiry date, if any.
    pub fn resolve_column<'a>(&self, columns: &'a [String]) -> Option<&'a String> {
        let found = self
            .field_names
            .iter()
            .find_map(|name| find_column(columns, name));
        trace!("Expiry column resolved to {:?}", found);
        found
    }

    /// Unparseable or missing values never count as expired.
    pub fn is_expired(&self, document: &Document, column: Option<&str>, today: NaiveDate) -> bool {
        let Some(column) = column else {
            return false;
        };
        parse_date(value_of(document, column))
            .date()
            .is_some_and(|end| end < today)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(crate::domain::BoardConfig::default().expiry_fields)
    }
}
