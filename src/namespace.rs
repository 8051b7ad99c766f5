//! Namespace declaration tracking and required-prefix resolution.

use ahash::AHashMap;
use log::warn;

use crate::{Error, Result};

/// The two taxonomy prefixes a filing must declare for extraction to work.
///
/// These are conventional SEC labels, not business logic, so they are
/// supplied as configuration rather than hardcoded at the match sites.
#[derive(Debug, Clone)]
pub struct TaxonomyPrefixes {
    /// Accounting-facts taxonomy (GAAP concepts).
    pub facts: String,
    /// Document and entity information taxonomy.
    pub metadata: String,
}

impl Default for TaxonomyPrefixes {
    fn default() -> Self {
        Self {
            facts: "us-gaap".to_string(),
            metadata: "dei".to_string(),
        }
    }
}

/// Prefix → namespace URI bindings seen so far in the document.
///
/// Known limitation: bindings are not scoped to subtrees. A prefix redeclared
/// deeper in the document with a different URI keeps its first binding, and
/// the redeclaration is logged. XBRL instances declare everything on the root
/// element, so this does not bite in practice.
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    bindings: AHashMap<String, String>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration, keeping the first binding on conflict.
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if prefix.is_empty() {
            return;
        }
        match self.bindings.get(prefix) {
            Some(existing) if existing != uri => {
                warn!("prefix '{prefix}' redeclared as '{uri}', keeping '{existing}'");
            }
            Some(_) => {}
            None => {
                self.bindings.insert(prefix.to_string(), uri.to_string());
            }
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve both required prefixes, or fail the document.
    pub fn resolve(&self, prefixes: &TaxonomyPrefixes) -> Result<ResolvedNamespaces> {
        let facts = self
            .get(&prefixes.facts)
            .ok_or_else(|| Error::MissingNamespace(prefixes.facts.clone()))?;
        let metadata = self
            .get(&prefixes.metadata)
            .ok_or_else(|| Error::MissingNamespace(prefixes.metadata.clone()))?;
        Ok(ResolvedNamespaces {
            facts_uri: facts.to_string(),
            metadata_uri: metadata.to_string(),
        })
    }
}

/// URIs of the two taxonomies of interest, fixed at the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNamespaces {
    pub facts_uri: String,
    pub metadata_uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_binding_wins() {
        let mut table = NamespaceTable::new();
        table.declare("us-gaap", "http://fasb.org/us-gaap/2015-01-31");
        table.declare("us-gaap", "http://fasb.org/us-gaap/2014-01-31");
        assert_eq!(
            table.get("us-gaap"),
            Some("http://fasb.org/us-gaap/2015-01-31")
        );
    }

    #[test]
    fn test_default_prefix_ignored() {
        let mut table = NamespaceTable::new();
        table.declare("", "http://www.xbrl.org/2003/instance");
        assert!(table.is_empty());
    }

    #[test]
    fn test_resolve_missing_prefix() {
        let mut table = NamespaceTable::new();
        table.declare("us-gaap", "http://fasb.org/us-gaap/2015-01-31");
        let err = table.resolve(&TaxonomyPrefixes::default()).unwrap_err();
        assert!(matches!(err, crate::Error::MissingNamespace(p) if p == "dei"));
    }

    #[test]
    fn test_resolve_both() {
        let mut table = NamespaceTable::new();
        table.declare("us-gaap", "http://fasb.org/us-gaap/2015-01-31");
        table.declare("dei", "http://xbrl.sec.gov/dei/2014-01-31");
        let resolved = table.resolve(&TaxonomyPrefixes::default()).unwrap();
        assert_eq!(resolved.facts_uri, "http://fasb.org/us-gaap/2015-01-31");
        assert_eq!(resolved.metadata_uri, "http://xbrl.sec.gov/dei/2014-01-31");
    }
}
