use ahash::AHashMap;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::{Error, Result};

// ============================================================================
// Core data structures for filing extraction
// ============================================================================

/// Concept local name → raw text value, for one reporting context.
///
/// Ordered map so that serialized output is stable across runs.
pub type FactSet = BTreeMap<String, String>;

/// The time coordinate of a reporting context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Period {
    /// A single point in time; balance-sheet contexts use these.
    Instant { date: NaiveDate },
    /// A date range; income-statement and cash-flow contexts use these.
    Duration { start: NaiveDate, end: NaiveDate },
}

impl Period {
    /// End of the period; for an instant, the instant itself.
    pub fn end(&self) -> NaiveDate {
        match self {
            Period::Instant { date } => *date,
            Period::Duration { end, .. } => *end,
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            Period::Instant { .. } => None,
            Period::Duration { start, .. } => Some(*start),
        }
    }

    /// Calendar days covered by a duration period. None for instants.
    pub fn span_days(&self) -> Option<i64> {
        match self {
            Period::Instant { .. } => None,
            Period::Duration { start, end } => Some((*end - *start).num_days()),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Instant { date } => write!(f, "instant {date}"),
            Period::Duration { start, end } => {
                write!(f, "{start} to {end} ({} days)", (*end - *start).num_days())
            }
        }
    }
}

/// One reporting context from the filing, classified and dated.
///
/// Contexts whose period could not be classified as a duration or an instant
/// are discarded during parsing and never reach this type. Entity matching
/// against the filer's CIK happens later, in the selector, once the document
/// metadata is fully known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingContext {
    pub id: String,
    pub entity: u64,
    pub period: Period,
}

/// Filing type, which fixes the plausible day-span of a statement period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentKind {
    TenK,
    TenQ,
}

impl DocumentKind {
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "10-K" => Ok(DocumentKind::TenK),
            "10-Q" => Ok(DocumentKind::TenQ),
            other => Err(Error::UnsupportedDocumentType(other.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DocumentKind::TenK => "10-K",
            DocumentKind::TenQ => "10-Q",
        }
    }

    /// Accepted day-span for a statement-of-operations period, inclusive on
    /// both ends. Annual filings run 360-369 days (52/53-week fiscal years),
    /// quarterly 89-96.
    pub fn span_bounds(&self) -> RangeInclusive<i64> {
        match self {
            DocumentKind::TenK => 360..=369,
            DocumentKind::TenQ => 89..=96,
        }
    }
}

// Metadata concepts in the entity/period (dei) namespace that drive selection.
pub const ENTITY_CENTRAL_INDEX_KEY: &str = "EntityCentralIndexKey";
pub const DOCUMENT_PERIOD_END_DATE: &str = "DocumentPeriodEndDate";
pub const DOCUMENT_TYPE: &str = "DocumentType";

/// Typed document-level metadata, parsed from the raw dei concept map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentProfile {
    /// The filer's own SEC Central Index Key.
    pub cik: u64,
    /// Stated end date of the reporting period covered by the filing.
    pub period_end: NaiveDate,
    pub kind: DocumentKind,
}

impl DocumentProfile {
    /// Parse the three required metadata concepts out of the raw map.
    ///
    /// Downstream period matching is meaningless without any one of these,
    /// so every failure here is fatal for the document.
    pub fn from_raw(raw: &AHashMap<String, String>) -> Result<Self> {
        let cik_text = raw
            .get(ENTITY_CENTRAL_INDEX_KEY)
            .ok_or(Error::MissingMetadata(ENTITY_CENTRAL_INDEX_KEY))?;
        let cik = cik_text
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::MalformedIdentifier(cik_text.clone()))?;

        let end_text = raw
            .get(DOCUMENT_PERIOD_END_DATE)
            .ok_or(Error::MissingMetadata(DOCUMENT_PERIOD_END_DATE))?;
        let period_end = parse_iso_date(end_text, DOCUMENT_PERIOD_END_DATE)?;

        let kind_text = raw
            .get(DOCUMENT_TYPE)
            .ok_or(Error::MissingMetadata(DOCUMENT_TYPE))?;
        let kind = DocumentKind::from_code(kind_text.trim())?;

        Ok(Self {
            cik,
            period_end,
            kind,
        })
    }
}

pub(crate) fn parse_iso_date(text: &str, field: &'static str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| Error::MalformedDate {
        field,
        value: text.to_string(),
    })
}

/// Which statement slot a context was selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    /// Date-range context: income statement / cash-flow statement.
    DateRange,
    /// Instant context: balance sheet.
    Instant,
}

/// The fact set selected for one statement, with its source context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementFacts {
    pub context_id: String,
    pub period: Period,
    pub facts: FactSet,
}

/// A second context qualified for a slot that was already filled. The first
/// one (in document order) is kept; this records the loser for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionConflict {
    pub kind: StatementKind,
    pub kept: String,
    pub ignored: String,
}

/// Output of context selection. Either slot may be empty, which means "no
/// qualifying context" rather than an error; the caller decides whether that
/// warrants flagging the filing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub date_range: Option<StatementFacts>,
    pub instant: Option<StatementFacts>,
    pub conflicts: Vec<SelectionConflict>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none() && self.instant.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_document_kind_codes() {
        assert_eq!(DocumentKind::from_code("10-K").unwrap(), DocumentKind::TenK);
        assert_eq!(DocumentKind::from_code("10-Q").unwrap(), DocumentKind::TenQ);
        assert!(matches!(
            DocumentKind::from_code("8-K"),
            Err(Error::UnsupportedDocumentType(_))
        ));
    }

    #[test]
    fn test_span_bounds() {
        assert!(DocumentKind::TenK.span_bounds().contains(&364));
        assert!(!DocumentKind::TenK.span_bounds().contains(&359));
        assert!(DocumentKind::TenQ.span_bounds().contains(&89));
        assert!(!DocumentKind::TenQ.span_bounds().contains(&88));
    }

    #[test]
    fn test_period_span() {
        let p = Period::Duration {
            start: date("2014-09-28"),
            end: date("2015-09-26"),
        };
        assert_eq!(p.span_days(), Some(363));
        assert_eq!(p.start(), Some(date("2014-09-28")));
        assert_eq!(p.end(), date("2015-09-26"));

        let i = Period::Instant {
            date: date("2015-09-26"),
        };
        assert_eq!(i.span_days(), None);
        assert_eq!(i.end(), date("2015-09-26"));
    }

    #[test]
    fn test_profile_from_raw() {
        let mut raw = AHashMap::new();
        raw.insert(ENTITY_CENTRAL_INDEX_KEY.to_string(), "320193".to_string());
        raw.insert(DOCUMENT_PERIOD_END_DATE.to_string(), "2015-09-26".to_string());
        raw.insert(DOCUMENT_TYPE.to_string(), "10-K".to_string());

        let profile = DocumentProfile::from_raw(&raw).unwrap();
        assert_eq!(profile.cik, 320193);
        assert_eq!(profile.period_end, date("2015-09-26"));
        assert_eq!(profile.kind, DocumentKind::TenK);
    }

    #[test]
    fn test_profile_malformed_fields() {
        let mut raw = AHashMap::new();
        raw.insert(ENTITY_CENTRAL_INDEX_KEY.to_string(), "AAPL".to_string());
        raw.insert(DOCUMENT_PERIOD_END_DATE.to_string(), "2015-09-26".to_string());
        raw.insert(DOCUMENT_TYPE.to_string(), "10-K".to_string());
        assert!(matches!(
            DocumentProfile::from_raw(&raw),
            Err(Error::MalformedIdentifier(_))
        ));

        raw.insert(ENTITY_CENTRAL_INDEX_KEY.to_string(), "320193".to_string());
        raw.insert(DOCUMENT_PERIOD_END_DATE.to_string(), "Sep 26 2015".to_string());
        assert!(matches!(
            DocumentProfile::from_raw(&raw),
            Err(Error::MalformedDate { .. })
        ));

        raw.insert(DOCUMENT_PERIOD_END_DATE.to_string(), "2015-09-26".to_string());
        raw.remove(DOCUMENT_TYPE);
        assert!(matches!(
            DocumentProfile::from_raw(&raw),
            Err(Error::MissingMetadata(DOCUMENT_TYPE))
        ));
    }
}
