//! High-level SEC filing extraction: parse, resolve metadata, select.
//!
//! This is the seam a batch driver or persistence sink calls. Each extractor
//! holds no per-document state, so independent instances can process filings
//! in parallel without coordination.

use log::info;
use serde::Serialize;
use std::path::Path;

use crate::model::{DocumentProfile, Selection};
use crate::namespace::TaxonomyPrefixes;
use crate::parser::{FilingParser, ParsedFiling};
use crate::selector;
use crate::Result;

/// Everything extracted from one filing.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub profile: DocumentProfile,
    pub selection: Selection,
}

pub struct FilingExtractor {
    parser: FilingParser,
}

impl FilingExtractor {
    pub fn new() -> Self {
        Self {
            parser: FilingParser::new(),
        }
    }

    pub fn with_prefixes(mut self, prefixes: TaxonomyPrefixes) -> Self {
        self.parser = FilingParser::new().with_prefixes(prefixes);
        self
    }

    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<Extraction> {
        let filing = self.parser.parse_file(path)?;
        self.resolve(&filing)
    }

    pub fn extract_str(&self, xml: &str) -> Result<Extraction> {
        let filing = self.parser.parse_str(xml)?;
        self.resolve(&filing)
    }

    /// The logical second pass over the buffered tables: type the metadata,
    /// then classify and select contexts against it.
    pub fn resolve(&self, filing: &ParsedFiling) -> Result<Extraction> {
        let profile = DocumentProfile::from_raw(&filing.metadata)?;
        info!(
            "filing: CIK {} {} period ending {}",
            profile.cik,
            profile.kind.code(),
            profile.period_end
        );

        let selection = selector::select(filing, &profile);
        if selection.is_empty() {
            info!("no qualifying statement context found for CIK {}", profile.cik);
        }

        Ok(Extraction { profile, selection })
    }
}

impl Default for FilingExtractor {
    fn default() -> Self {
        Self::new()
    }
}
