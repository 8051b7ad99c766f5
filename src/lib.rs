//! formten - XBRL fact extractor for SEC Form 10-K/10-Q filings
//!
//! Parses an XBRL instance document in one forward pass, resolves which of
//! the document's many reporting contexts carry the filer's own
//! current-period financial statements, and returns two concept→value maps:
//! one for the date-range context (income/cash-flow statement) and one for
//! the instant context (balance sheet).

pub mod model;
pub mod namespace;
pub mod parser;
pub mod schema;
pub mod sec;
pub mod selector;

pub use model::{DocumentKind, DocumentProfile, Period, ReportingContext, Selection, StatementFacts};
pub use parser::{FilingParser, ParsedFiling};
pub use sec::FilingExtractor;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// A required taxonomy prefix was never declared. Continuing without it
    /// would silently drop every subsequent fact, so this aborts the document.
    #[error("required namespace prefix '{0}' is not declared in this document")]
    MissingNamespace(String),

    #[error("filing metadata is missing '{0}'")]
    MissingMetadata(&'static str),

    #[error("entity identifier '{0}' is not numeric")]
    MalformedIdentifier(String),

    #[error("'{value}' is not a valid {field} date (expected YYYY-MM-DD)")]
    MalformedDate { field: &'static str, value: String },

    #[error("unsupported document type '{0}' (expected 10-K or 10-Q)")]
    UnsupportedDocumentType(String),
}
