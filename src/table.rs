use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::dates::parse_date;
use crate::documents::{Document, derive_columns, order_columns, value_of};
use crate::expiry::ExpiryPolicy;

/// Column order used by the dashboard and the PDF export when the labels
/// can be recognised.
pub const CANONICAL_COLUMNS: [&str; 9] = [
    "Date-fin",
    "Date-initial",
    "Montant par Mois",
    "Motif-Saisi",
    "Nom-beneficaire",
    "Nom-employé",
    "Relation-employe-beneficiaire",
    "fonction-employé",
    "total-à-payer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Label,
    Created,
    Column(String),
}

impl SortKey {
    fn value<'a>(&self, document: &'a Document) -> Cow<'a, str> {
        match self {
            SortKey::Label => Cow::Borrowed(document.label.as_str()),
            SortKey::Created => Cow::Owned(document.created_display()),
            SortKey::Column(name) => Cow::Borrowed(value_of(document, name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: None,
            direction: SortDirection::Ascending,
        }
    }
}

enum SortValue {
    Empty,
    Stamp(DateTime<FixedOffset>),
    Date(NaiveDateTime),
    Text,
}

/// Case-insensitive match of `needle` (already lowercased) against the
/// label, creation time and every column value.
pub fn matches_text(document: &Document, columns: &[String], needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    document.label.to_lowercase().contains(needle)
        || document.created_display().to_lowercase().contains(needle)
        || columns
            .iter()
            .any(|c| value_of(document, c).to_lowercase().contains(needle))
}

/// Filter, sort and paginate over an immutable document snapshot.
///
/// `rows` maps the visible position to the index in `documents`, so the
/// snapshot itself is never reordered.
pub struct DocumentTable {
    documents: Arc<Vec<Document>>,
    columns: Vec<String>,
    display_columns: Vec<String>,
    expiry: ExpiryPolicy,
    expiry_column: Option<String>,
    filter: String,
    column_filters: BTreeMap<String, String>,
    sort: SortState,
    rows: Arc<Vec<usize>>,
    page: usize,
    page_size: usize,
}

impl DocumentTable {
    pub fn new(page_size: usize, expiry: ExpiryPolicy) -> Self {
        Self {
            documents: Arc::new(Vec::new()),
            columns: Vec::new(),
            display_columns: Vec::new(),
            expiry,
            expiry_column: None,
            filter: String::new(),
            column_filters: BTreeMap::new(),
            sort: SortState::default(),
            rows: Arc::new(Vec::new()),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn from_documents(documents: Vec<Document>, page_size: usize, expiry: ExpiryPolicy) -> Self {
        let mut table = Self::new(page_size, expiry);
        table.replace_snapshot(documents);
        table
    }

    /// Swaps in a freshly fetched snapshot. Filters and sort survive, the
    /// page is clamped.
    pub fn replace_snapshot(&mut self, documents: Vec<Document>) {
        self.columns = derive_columns(&documents);
        self.display_columns = order_columns(&self.columns, &CANONICAL_COLUMNS);
        self.expiry_column = self.expiry.resolve_column(&self.columns).cloned();
        self.column_filters.retain(|c, _| self.columns.contains(c));
        self.documents = Arc::new(documents);
        debug!(
            "Snapshot replaced: {} documents, {} columns",
            self.documents.len(),
            self.columns.len()
        );
        self.refresh();
        self.clamp_page();
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn display_columns(&self) -> &[String] {
        &self.display_columns
    }

    pub fn expiry_column(&self) -> Option<&str> {
        self.expiry_column.as_deref()
    }

    pub fn is_expired(&self, document: &Document, today: NaiveDate) -> bool {
        self.expiry
            .is_expired(document, self.expiry_column.as_deref(), today)
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn column_filters(&self) -> &BTreeMap<String, String> {
        &self.column_filters
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.trim().to_string();
        self.refresh();
        self.page = 1;
    }

    pub fn set_column_filter(&mut self, column: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.column_filters.remove(column);
        } else {
            self.column_filters
                .insert(column.to_string(), text.to_string());
        }
        self.refresh();
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
        self.column_filters.clear();
        self.refresh();
        self.page = 1;
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    /// Sorting on the active key flips the direction, a new key starts
    /// ascending.
    pub fn sort_by(&mut self, key: SortKey) {
        if self.sort.key.as_ref() == Some(&key) {
            self.sort.direction = self.sort.direction.toggled();
        } else {
            self.sort.key = Some(key);
            self.sort.direction = SortDirection::Ascending;
        }
        trace!("Sort state now {:?}", self.sort);
        self.refresh();
        self.clamp_page();
    }

    pub fn visible_len(&self) -> usize {
        self.rows.len()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Document> {
        self.rows.iter().map(|&idx| &self.documents[idx])
    }

    pub fn visible_at(&self, position: usize) -> Option<&Document> {
        self.rows.get(position).map(|&idx| &self.documents[idx])
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size).max(1)
    }

    pub fn goto_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.page_count());
    }

    pub fn next_page(&mut self) {
        self.goto_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.goto_page(self.page.saturating_sub(1));
    }

    /// Position in the visible set of the first row on the current page.
    pub fn page_offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }

    pub fn page_rows(&self) -> Vec<&Document> {
        let begin = self.page_offset().min(self.rows.len());
        let end = (begin + self.page_size).min(self.rows.len());
        self.rows[begin..end]
            .iter()
            .map(|&idx| &self.documents[idx])
            .collect()
    }

    fn clamp_page(&mut self) {
        self.goto_page(self.page);
    }

    /// Filters always start from the full snapshot.
    fn refresh(&mut self) {
        let start_time = Instant::now();
        let needle = self.filter.to_lowercase();
        let column_needles: Vec<(&String, String)> = self
            .column_filters
            .iter()
            .map(|(c, t)| (c, t.to_lowercase()))
            .collect();
        let documents = &self.documents;
        let columns = &self.columns;

        let mut rows: Vec<usize> = (0..documents.len())
            .into_par_iter()
            .filter(|&idx| {
                let document = &documents[idx];
                matches_text(document, columns, &needle)
                    && column_needles.iter().all(|(column, text)| {
                        value_of(document, column).to_lowercase().contains(text)
                    })
            })
            .collect();
        self.sort_rows(&mut rows);

        trace!(
            "Filter '{}' kept {}/{} rows in {}ms",
            self.filter,
            rows.len(),
            documents.len(),
            start_time.elapsed().as_millis()
        );
        self.rows = Arc::new(rows);
    }

    fn sort_rows(&self, rows: &mut Vec<usize>) {
        let Some(key) = &self.sort.key else {
            return;
        };
        let descending = self.sort.direction == SortDirection::Descending;

        let mut keyed: Vec<(usize, SortValue)> = rows
            .iter()
            .map(|&idx| {
                if *key == SortKey::Created {
                    let value = match self.documents[idx].datetime_created {
                        Some(at) => SortValue::Stamp(at),
                        None => SortValue::Empty,
                    };
                    return (idx, value);
                }
                let raw = key.value(&self.documents[idx]);
                let value = if raw.is_empty() {
                    SortValue::Empty
                } else {
                    match parse_date(&raw).valid() {
                        Some(at) => SortValue::Date(at),
                        None => SortValue::Text,
                    }
                };
                (idx, value)
            })
            .collect();

        // Dates only compare chronologically when no free text is mixed in,
        // otherwise the ordering would not be total.
        let chronological = !keyed.iter().any(|(_, v)| matches!(v, SortValue::Text));
        let documents = &self.documents;
        keyed.sort_by(|(ia, a), (ib, b)| {
            let ordering = match (a, b) {
                (SortValue::Stamp(x), SortValue::Stamp(y)) => x.cmp(y),
                (SortValue::Date(x), SortValue::Date(y)) if chronological => x.cmp(y),
                (SortValue::Empty, SortValue::Empty) => Ordering::Equal,
                (SortValue::Empty, _) => Ordering::Less,
                (_, SortValue::Empty) => Ordering::Greater,
                _ => key.value(&documents[*ia]).cmp(&key.value(&documents[*ib])),
            };
            if descending { ordering.reverse() } else { ordering }
        });

        *rows = keyed.into_iter().map(|(idx, _)| idx).collect();
    }
}
