use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::error::RelayError;
use crate::{
    dates::parse_date,
    documents::{Document, derive_columns},
    expiry::ExpiryPolicy,
    table::matches_text,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Expired,
    Active,
}

/// Filters accepted on the document routes. Applied after the upstream call.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    pub keyword: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
}

impl DocumentQuery {
    pub fn apply(
        &self,
        documents: Vec<Document>,
        expiry: &ExpiryPolicy,
        today: NaiveDate,
    ) -> Result<Vec<Document>, RelayError> {
        let start = bound(self.start_date.as_deref(), "startDate")?;
        let end = bound(self.end_date.as_deref(), "endDate")?;
        let status = self.status_filter()?;
        let keyword = self
            .keyword
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_lowercase();

        let columns = derive_columns(&documents);
        let expiry_column = expiry.resolve_column(&columns).cloned();

        let before = documents.len();
        let kept: Vec<Document> = documents
            .into_iter()
            .filter(|doc| matches_text(doc, &columns, &keyword))
            .filter(|doc| within(doc, start, end))
            .filter(|doc| match status {
                None => true,
                Some(wanted) => {
                    let expired = expiry.is_expired(doc, expiry_column.as_deref(), today);
                    expired == (wanted == StatusFilter::Expired)
                }
            })
            .collect();
        debug!("Query {:?} kept {} of {before} documents", self, kept.len());
        Ok(kept)
    }

    fn status_filter(&self) -> Result<Option<StatusFilter>, RelayError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some("expired") => Ok(Some(StatusFilter::Expired)),
            Some("active") => Ok(Some(StatusFilter::Active)),
            Some(other) => Err(RelayError::BadRequest(format!(
                "Invalid status '{other}', expected 'expired' or 'active'."
            ))),
        }
    }
}

fn bound(raw: Option<&str>, name: &str) -> Result<Option<NaiveDate>, RelayError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value)
            .date()
            .map(Some)
            .ok_or_else(|| RelayError::BadRequest(format!("Invalid {name} '{value}'."))),
    }
}

/// Documents without a creation time fall outside any explicit bound.
fn within(document: &Document, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    let Some(created) = document.datetime_created.map(|at| at.naive_local().date()) else {
        return false;
    };
    start.is_none_or(|s| created >= s) && end.is_none_or(|e| created <= e)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn created(mut doc: Document, at: &str) -> Document {
        doc.datetime_created = Some(DateTime::parse_from_rfc3339(at).unwrap());
        doc
    }

    fn fixture() -> Vec<Document> {
        vec![
            created(
                Document::new(1, "A").with_metadata("Date-fin", "01-01-2020"),
                "2024-03-01T10:00:00+03:00",
            ),
            created(
                Document::new(2, "B").with_metadata("Date-fin", "01-01-2099"),
                "2024-05-15T08:30:00+03:00",
            ),
            Document::new(3, "Cheikh").with_metadata("Nom-employé", "Omar"),
        ]
    }

    fn labels(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.label.as_str()).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn empty_query_keeps_everything() {
        let kept = DocumentQuery::default()
            .apply(fixture(), &ExpiryPolicy::default(), today())
            .unwrap();
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn keyword_matches_values_case_insensitively() {
        let query = DocumentQuery {
            keyword: Some("OMAR".into()),
            ..Default::default()
        };
        let kept = query.apply(fixture(), &ExpiryPolicy::default(), today()).unwrap();
        assert_eq!(labels(&kept), ["Cheikh"]);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let query = DocumentQuery {
            start_date: Some("2024-03-01".into()),
            end_date: Some("15/05/2024".into()),
            ..Default::default()
        };
        let kept = query.apply(fixture(), &ExpiryPolicy::default(), today()).unwrap();
        assert_eq!(labels(&kept), ["A", "B"]);

        let query = DocumentQuery {
            start_date: Some("2024-03-02".into()),
            ..Default::default()
        };
        let kept = query.apply(fixture(), &ExpiryPolicy::default(), today()).unwrap();
        assert_eq!(labels(&kept), ["B"]);
    }

    #[test]
    fn status_uses_the_expiry_policy() {
        let expired = DocumentQuery {
            status: Some("expired".into()),
            ..Default::default()
        };
        let kept = expired.apply(fixture(), &ExpiryPolicy::default(), today()).unwrap();
        assert_eq!(labels(&kept), ["A"]);

        let active = DocumentQuery {
            status: Some("active".into()),
            ..Default::default()
        };
        let kept = active.apply(fixture(), &ExpiryPolicy::default(), today()).unwrap();
        assert_eq!(labels(&kept), ["B", "Cheikh"]);
    }

    #[test]
    fn bad_values_are_rejected() {
        let query = DocumentQuery {
            status: Some("archived".into()),
            ..Default::default()
        };
        assert!(matches!(
            query.apply(fixture(), &ExpiryPolicy::default(), today()),
            Err(RelayError::BadRequest(_))
        ));

        let query = DocumentQuery {
            end_date: Some("tomorrow".into()),
            ..Default::default()
        };
        assert!(matches!(
            query.apply(fixture(), &ExpiryPolicy::default(), today()),
            Err(RelayError::BadRequest(_))
        ));
    }
}
