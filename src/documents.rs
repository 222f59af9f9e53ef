//! Documents as served by Mayan EDMS and the helpers that turn their
//! free-form metadata into table columns.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

pub const PLACEHOLDER: &str = "-";
pub const CREATED_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataType {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub metadata_type: MetadataType,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub datetime_created: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

impl Document {
    #[cfg(test)]
    pub fn new(id: u64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            datetime_created: None,
            metadata: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_metadata(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push(MetadataEntry {
            metadata_type: MetadataType {
                label: label.into(),
            },
            value: value.into(),
        });
        self
    }

    pub fn created_display(&self) -> String {
        self.datetime_created
            .map(|at| at.format(CREATED_FORMAT).to_string())
            .unwrap_or_default()
    }
}

/// Either a flat array or a DRF page envelope (`{count, next, results}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { results: Vec<T> },
    Flat(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::Flat(items) => items,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Distinct metadata labels in first-seen order.
pub fn derive_columns(documents: &[Document]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for entry in documents.iter().flat_map(|d| d.metadata.iter()) {
        if seen.insert(entry.metadata_type.label.as_str()) {
            columns.push(entry.metadata_type.label.clone());
        }
    }
    columns
}

/// The one value lookup shared by filtering, sorting, rendering and export.
pub fn value_of<'a>(document: &'a Document, column: &str) -> &'a str {
    document
        .metadata
        .iter()
        .find(|m| m.metadata_type.label == column)
        .map(|m| m.value.as_str())
        .unwrap_or("")
}

pub fn display_value<'a>(document: &'a Document, column: &str) -> &'a str {
    match value_of(document, column) {
        "" => PLACEHOLDER,
        value => value,
    }
}

/// Comparison form of a label: lowercase, accents stripped, no blanks or underscores.
pub fn fold_label(label: &str) -> String {
    label
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect()
}

pub fn find_column<'a>(columns: &'a [String], wanted: &str) -> Option<&'a String> {
    let wanted = fold_label(wanted);
    if wanted.is_empty() {
        return None;
    }
    columns.iter().find(|c| fold_label(c).contains(&wanted))
}

/// Columns matching `preferred` come first in that order, the rest keep
/// their first-seen order.
pub fn order_columns(columns: &[String], preferred: &[&str]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::with_capacity(columns.len());
    for name in preferred {
        if let Some(found) = find_column(columns, name) {
            if !ordered.contains(found) {
                ordered.push(found.clone());
            }
        }
    }
    for column in columns {
        if !ordered.contains(column) {
            ordered.push(column.clone());
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Document> {
        vec![
            Document::new(1, "A")
                .with_metadata("Nom-employé", "Ali")
                .with_metadata("Date-fin", "01-01-2020"),
            Document::new(2, "B")
                .with_metadata("Date-fin", "01-01-2099")
                .with_metadata("total-à-payer", "12 000"),
            Document::new(3, "C"),
        ]
    }

    #[test]
    fn columns_cover_every_label_once() {
        let docs = sample();
        let columns = derive_columns(&docs);
        assert_eq!(columns, vec!["Nom-employé", "Date-fin", "total-à-payer"]);
        for doc in &docs {
            for entry in &doc.metadata {
                assert!(columns.contains(&entry.metadata_type.label));
            }
        }
        assert_eq!(derive_columns(&docs), columns);
    }

    #[test]
    fn lookup_falls_back_to_empty_and_placeholder() {
        let docs = sample();
        assert_eq!(value_of(&docs[0], "Date-fin"), "01-01-2020");
        assert_eq!(value_of(&docs[2], "Date-fin"), "");
        assert_eq!(display_value(&docs[2], "Date-fin"), PLACEHOLDER);
        assert_eq!(display_value(&docs[1], "total-à-payer"), "12 000");
    }

    #[test]
    fn folding_ignores_case_accents_and_blanks() {
        assert_eq!(fold_label("Nom-Employé"), "nom-employe");
        assert_eq!(fold_label("Montant par Mois"), "montantparmois");
        assert_eq!(fold_label("expiry_date"), "expirydate");
        assert_eq!(fold_label("Total-À-Payer"), "total-a-payer");
    }

    #[test]
    fn preferred_order_then_encountered_order() {
        let columns = vec![
            "Remarque".to_string(),
            "total-a-payer".to_string(),
            "date fin".to_string(),
            "Date-fin".to_string(),
        ];
        let ordered = order_columns(&columns, &["Date-fin", "total-à-payer"]);
        assert_eq!(ordered, vec!["Date-fin", "total-a-payer", "Remarque", "date fin"]);
    }

    #[test]
    fn listing_accepts_flat_and_paged_payloads() {
        let flat = r#"[{"id": 4, "label": "x.pdf", "metadata": [{"metadata_type": {"label": "Date-fin"}, "value": null}]}]"#;
        let docs = serde_json::from_str::<Listing<Document>>(flat).unwrap().into_items();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata[0].value, "");

        let paged = r#"{"count": 1, "next": null, "previous": null, "results": [{"id": 9, "label": "y.pdf", "datetime_created": "2024-05-01T09:30:00+03:00"}]}"#;
        let docs = serde_json::from_str::<Listing<Document>>(paged).unwrap().into_items();
        assert_eq!(docs[0].id, 9);
        assert_eq!(docs[0].created_display(), "01/05/2024 09:30:00");
        assert!(docs[0].metadata.is_empty());
    }
}
