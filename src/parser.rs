//! Single forward streaming pass over an XBRL instance document.
//!
//! The pass accumulates four tables: the namespace table, the reporting
//! contexts in document order, the per-context fact sets, and the raw
//! document metadata. Entity-match filtering and statement selection run
//! afterwards (see [`crate::selector`]), once the metadata is fully known.

use ahash::AHashMap;
use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use quick_xml::NsReader;
use std::path::Path;

use crate::model::{parse_iso_date, FactSet, Period, ReportingContext};
use crate::namespace::{NamespaceTable, ResolvedNamespaces, TaxonomyPrefixes};
use crate::{Error, Result};

/// Namespace of XBRL structural elements: xbrl, context, period, entity.
pub const XBRL_INSTANCE_NS: &str = "http://www.xbrl.org/2003/instance";

/// Streaming parser for one filing. Holds no state between documents.
pub struct FilingParser {
    prefixes: TaxonomyPrefixes,
}

impl FilingParser {
    pub fn new() -> Self {
        Self {
            prefixes: TaxonomyPrefixes::default(),
        }
    }

    pub fn with_prefixes(mut self, prefixes: TaxonomyPrefixes) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ParsedFiling> {
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content)
    }

    pub fn parse_str(&self, xml: &str) -> Result<ParsedFiling> {
        // Skip BOM if present
        let xml = xml.trim_start_matches('\u{feff}');

        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stream = FilingStream::new(self.prefixes.clone());

        loop {
            match reader.read_event()? {
                Event::Start(e) => stream.on_start(&reader, &e)?,
                Event::Empty(e) => {
                    stream.on_start(&reader, &e)?;
                    stream.on_end(&reader, e.name());
                }
                Event::Text(t) => stream.on_text(&t.unescape()?),
                Event::CData(t) => {
                    let bytes = t.into_inner();
                    stream.on_text(&String::from_utf8_lossy(&bytes));
                }
                Event::End(e) => stream.on_end(&reader, e.name()),
                Event::Eof => break,
                _ => {}
            }
        }

        stream.finish()
    }
}

impl Default for FilingParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything collected by the streaming pass, still unfiltered.
#[derive(Debug, Clone)]
pub struct ParsedFiling {
    pub namespaces: NamespaceTable,
    /// Reporting contexts in document order. Contexts whose period could not
    /// be classified have already been dropped; contexts for other entities
    /// have not (the filer's CIK is not known until metadata is parsed).
    pub contexts: Vec<ReportingContext>,
    /// Context ID → accounting facts tagged against that context.
    pub facts_by_context: AHashMap<String, FactSet>,
    /// Raw entity/period metadata concepts (dei), concept → text.
    pub metadata: AHashMap<String, String>,
}

impl ParsedFiling {
    pub fn fact_count(&self) -> usize {
        self.facts_by_context.values().map(|f| f.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InContext,
    InPeriod,
    InEntity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextField {
    StartDate,
    EndDate,
    Instant,
    Identifier,
}

#[derive(Debug, Default)]
struct ContextBuilder {
    id: String,
    start: Option<String>,
    end: Option<String>,
    instant: Option<String>,
    identifier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeafKind {
    Fact,
    Metadata,
}

/// An open fact or metadata element whose text is still being collected.
#[derive(Debug)]
struct PendingLeaf {
    kind: LeafKind,
    name: String,
    context_ref: Option<String>,
    text: String,
    /// Nesting depth of child elements below the leaf; only depth-0 text
    /// belongs to the leaf itself.
    depth: usize,
}

struct FilingStream {
    prefixes: TaxonomyPrefixes,
    namespaces: NamespaceTable,
    resolved: Option<ResolvedNamespaces>,
    state: State,
    context: Option<ContextBuilder>,
    field: Option<ContextField>,
    pending: Option<PendingLeaf>,
    contexts: Vec<ReportingContext>,
    facts_by_context: AHashMap<String, FactSet>,
    metadata: AHashMap<String, String>,
}

impl FilingStream {
    fn new(prefixes: TaxonomyPrefixes) -> Self {
        Self {
            prefixes,
            namespaces: NamespaceTable::new(),
            resolved: None,
            state: State::Outside,
            context: None,
            field: None,
            pending: None,
            contexts: Vec::with_capacity(64),
            facts_by_context: AHashMap::new(),
            metadata: AHashMap::new(),
        }
    }

    fn on_start<R>(&mut self, reader: &NsReader<R>, e: &BytesStart) -> Result<()> {
        self.collect_declarations(e)?;

        // XBRL declares its namespaces on the root element, so both required
        // prefixes must be bound by the time the first element opens.
        if self.resolved.is_none() {
            self.resolved = Some(self.namespaces.resolve(&self.prefixes)?);
        }

        // Children of an open fact are not facts themselves; just track depth
        // so the closing tag of the leaf is recognized.
        if let Some(pending) = self.pending.as_mut() {
            pending.depth += 1;
            return Ok(());
        }

        let (ns, local) = reader.resolve_element(e.name());
        let local = String::from_utf8_lossy(local.as_ref()).into_owned();
        let resolved = self.resolved.as_ref().expect("resolved at first element");

        match self.state {
            State::Outside => {
                if ns_matches(&ns, &resolved.facts_uri) {
                    self.pending = Some(PendingLeaf {
                        kind: LeafKind::Fact,
                        name: local,
                        context_ref: attr_value(e, "contextRef")?,
                        text: String::new(),
                        depth: 0,
                    });
                } else if ns_matches(&ns, &resolved.metadata_uri) {
                    self.pending = Some(PendingLeaf {
                        kind: LeafKind::Metadata,
                        name: local,
                        context_ref: None,
                        text: String::new(),
                        depth: 0,
                    });
                } else if structural(&ns) && local == "context" {
                    match attr_value(e, "id")? {
                        Some(id) => {
                            self.state = State::InContext;
                            self.context = Some(ContextBuilder {
                                id,
                                ..ContextBuilder::default()
                            });
                        }
                        None => warn!("context element without an id, skipping"),
                    }
                }
            }
            State::InContext if structural(&ns) => match local.as_str() {
                "period" => self.state = State::InPeriod,
                "entity" => self.state = State::InEntity,
                _ => {}
            },
            State::InPeriod if structural(&ns) => {
                self.field = match local.as_str() {
                    "startDate" => Some(ContextField::StartDate),
                    "endDate" => Some(ContextField::EndDate),
                    "instant" => Some(ContextField::Instant),
                    _ => None,
                };
            }
            State::InEntity if structural(&ns) && local == "identifier" => {
                self.field = Some(ContextField::Identifier);
            }
            _ => {}
        }

        Ok(())
    }

    fn on_text(&mut self, text: &str) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.depth == 0 {
                pending.text.push_str(text);
            }
            return;
        }

        let (Some(field), Some(builder)) = (self.field, self.context.as_mut()) else {
            return;
        };
        let slot = match field {
            ContextField::StartDate => &mut builder.start,
            ContextField::EndDate => &mut builder.end,
            ContextField::Instant => &mut builder.instant,
            ContextField::Identifier => &mut builder.identifier,
        };
        match slot {
            Some(existing) => existing.push_str(text),
            None => *slot = Some(text.to_string()),
        }
    }

    fn on_end<R>(&mut self, reader: &NsReader<R>, name: QName) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.depth > 0 {
                pending.depth -= 1;
                return;
            }
            let leaf = self.pending.take().expect("pending leaf present");
            self.commit_leaf(leaf);
            return;
        }

        let (ns, local) = reader.resolve_element(name);
        if !structural(&ns) {
            return;
        }
        let local = local.as_ref();

        match self.state {
            State::InPeriod => {
                self.field = None;
                if local == b"period" {
                    self.state = State::InContext;
                }
            }
            State::InEntity => {
                self.field = None;
                if local == b"entity" {
                    self.state = State::InContext;
                }
            }
            State::InContext if local == b"context" => {
                self.state = State::Outside;
                if let Some(builder) = self.context.take() {
                    self.finish_context(builder);
                }
            }
            _ => {}
        }
    }

    fn collect_declarations(&mut self, e: &BytesStart) -> Result<()> {
        for attr in e.attributes() {
            let attr = attr?;
            if let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") {
                let prefix = String::from_utf8_lossy(prefix).into_owned();
                let uri = attr.unescape_value()?;
                self.namespaces.declare(&prefix, &uri);
            }
        }
        Ok(())
    }

    fn commit_leaf(&mut self, leaf: PendingLeaf) {
        let text = leaf.text.trim();
        if text.is_empty() {
            debug!("{} has no text", leaf.name);
            return;
        }
        match leaf.kind {
            LeafKind::Fact => {
                let Some(context_ref) = leaf.context_ref else {
                    debug!("fact {} has no contextRef, skipping", leaf.name);
                    return;
                };
                debug!("fact {} [{}] = {}", leaf.name, context_ref, snippet(text));
                self.facts_by_context
                    .entry(context_ref)
                    .or_default()
                    .insert(leaf.name, text.to_string());
            }
            LeafKind::Metadata => {
                debug!("metadata {} = {}", leaf.name, snippet(text));
                self.metadata.insert(leaf.name, text.to_string());
            }
        }
    }

    /// Classify a closed context as a date range or an instant; a context
    /// that is neither, or whose fields fail to parse, is dropped. Bad data
    /// in one context never aborts the document.
    fn finish_context(&mut self, builder: ContextBuilder) {
        let id = builder.id;

        let entity = match builder.identifier.as_deref().map(str::trim) {
            Some(text) => match text.parse::<u64>() {
                Ok(cik) => cik,
                Err(_) => {
                    debug!("context {id}: non-numeric entity identifier '{text}', skipping");
                    return;
                }
            },
            None => {
                debug!("context {id}: no entity identifier, skipping");
                return;
            }
        };

        let period = match (&builder.start, &builder.end, &builder.instant) {
            (Some(start), Some(end), _) => {
                let start = parse_iso_date(start, "startDate");
                let end = parse_iso_date(end, "endDate");
                match (start, end) {
                    (Ok(start), Ok(end)) => Period::Duration { start, end },
                    _ => {
                        debug!("context {id}: unparseable period dates, skipping");
                        return;
                    }
                }
            }
            (_, _, Some(instant)) => match parse_iso_date(instant, "instant") {
                Ok(date) => Period::Instant { date },
                Err(_) => {
                    debug!("context {id}: unparseable instant date, skipping");
                    return;
                }
            },
            _ => {
                debug!("context {id}: neither a date range nor an instant, skipping");
                return;
            }
        };

        self.contexts.push(ReportingContext { id, entity, period });
    }

    fn finish(self) -> Result<ParsedFiling> {
        // A document with no elements never resolved its namespaces.
        if self.resolved.is_none() {
            return Err(Error::MissingNamespace(self.prefixes.facts));
        }
        Ok(ParsedFiling {
            namespaces: self.namespaces,
            contexts: self.contexts,
            facts_by_context: self.facts_by_context,
            metadata: self.metadata,
        })
    }
}

fn ns_matches(ns: &ResolveResult, uri: &str) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(bound)) if *bound == uri.as_bytes())
}

/// XBRL structural elements live in the instance namespace; accept unbound
/// names too for instances written without a default namespace.
fn structural(ns: &ResolveResult) -> bool {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => *uri == XBRL_INSTANCE_NS.as_bytes(),
        ResolveResult::Unbound => true,
        ResolveResult::Unknown(_) => false,
    }
}

fn attr_value(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Truncate long values for log output only; stored values are never cut.
fn snippet(text: &str) -> String {
    if text.chars().count() > 100 {
        let cut: String = text.chars().take(100).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Period;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:us-gaap="http://fasb.org/us-gaap/2015-01-31"
    xmlns:dei="http://xbrl.sec.gov/dei/2014-01-31">"#;

    fn doc(body: &str) -> String {
        format!("{HEADER}\n{body}\n</xbrli:xbrl>")
    }

    #[test]
    fn test_context_classification() {
        let xml = doc(
            r#"
            <xbrli:context id="D2015">
                <xbrli:entity>
                    <xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier>
                </xbrli:entity>
                <xbrli:period>
                    <xbrli:startDate>2014-09-28</xbrli:startDate>
                    <xbrli:endDate>2015-09-26</xbrli:endDate>
                </xbrli:period>
            </xbrli:context>
            <xbrli:context id="I2015">
                <xbrli:entity>
                    <xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier>
                </xbrli:entity>
                <xbrli:period>
                    <xbrli:instant>2015-09-26</xbrli:instant>
                </xbrli:period>
            </xbrli:context>
            <xbrli:context id="BROKEN">
                <xbrli:entity>
                    <xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier>
                </xbrli:entity>
                <xbrli:period>
                    <xbrli:endDate>garbage</xbrli:endDate>
                </xbrli:period>
            </xbrli:context>
        "#,
        );

        let filing = FilingParser::new().parse_str(&xml).unwrap();
        assert_eq!(filing.contexts.len(), 2);
        assert_eq!(filing.contexts[0].id, "D2015");
        assert_eq!(filing.contexts[0].entity, 320193);
        assert_eq!(
            filing.contexts[0].period,
            Period::Duration {
                start: date("2014-09-28"),
                end: date("2015-09-26"),
            }
        );
        assert_eq!(filing.contexts[1].id, "I2015");
        assert_eq!(
            filing.contexts[1].period,
            Period::Instant {
                date: date("2015-09-26")
            }
        );
    }

    #[test]
    fn test_facts_grouped_by_context() {
        let xml = doc(
            r#"
            <us-gaap:NetIncomeLoss contextRef="D1" unitRef="usd" decimals="-6">53394000000</us-gaap:NetIncomeLoss>
            <us-gaap:Revenues contextRef="D1">233715000000</us-gaap:Revenues>
            <us-gaap:Assets contextRef="I1">290479000000</us-gaap:Assets>
            <us-gaap:EmptyConcept contextRef="D1"/>
            <us-gaap:Orphan>42</us-gaap:Orphan>
        "#,
        );

        let filing = FilingParser::new().parse_str(&xml).unwrap();
        assert_eq!(filing.fact_count(), 3);

        let d1 = &filing.facts_by_context["D1"];
        assert_eq!(d1.get("NetIncomeLoss").map(String::as_str), Some("53394000000"));
        assert_eq!(d1.get("Revenues").map(String::as_str), Some("233715000000"));
        // Facts with no text and facts without a contextRef are dropped.
        assert!(!d1.contains_key("EmptyConcept"));
        assert_eq!(filing.facts_by_context["I1"].len(), 1);
    }

    #[test]
    fn test_long_values_are_not_truncated() {
        let long_value = "x".repeat(400);
        let xml = doc(&format!(
            r#"<us-gaap:AccountingPolicyTextBlock contextRef="D1">{long_value}</us-gaap:AccountingPolicyTextBlock>"#
        ));

        let filing = FilingParser::new().parse_str(&xml).unwrap();
        assert_eq!(
            filing.facts_by_context["D1"]["AccountingPolicyTextBlock"],
            long_value
        );
    }

    #[test]
    fn test_metadata_collected() {
        let xml = doc(
            r#"
            <dei:EntityCentralIndexKey contextRef="D1">0000320193</dei:EntityCentralIndexKey>
            <dei:DocumentType contextRef="D1">10-K</dei:DocumentType>
            <dei:DocumentPeriodEndDate contextRef="D1">2015-09-26</dei:DocumentPeriodEndDate>
        "#,
        );

        let filing = FilingParser::new().parse_str(&xml).unwrap();
        assert_eq!(filing.metadata["EntityCentralIndexKey"], "0000320193");
        assert_eq!(filing.metadata["DocumentType"], "10-K");
        assert_eq!(filing.metadata["DocumentPeriodEndDate"], "2015-09-26");
        // Metadata concepts are not facts.
        assert!(filing.facts_by_context.is_empty());
    }

    #[test]
    fn test_missing_namespace_is_fatal() {
        let xml = r#"<?xml version="1.0"?>
            <xbrl xmlns:us-gaap="http://fasb.org/us-gaap/2015-01-31"></xbrl>"#;
        let err = FilingParser::new().parse_str(xml).unwrap_err();
        assert!(matches!(err, Error::MissingNamespace(p) if p == "dei"));
    }

    #[test]
    fn test_foreign_entity_context_is_retained_for_later_filtering() {
        let xml = doc(
            r#"
            <xbrli:context id="OTHER">
                <xbrli:entity>
                    <xbrli:identifier scheme="http://www.sec.gov/CIK">0000999999</xbrli:identifier>
                </xbrli:entity>
                <xbrli:period>
                    <xbrli:instant>2015-09-26</xbrli:instant>
                </xbrli:period>
            </xbrli:context>
        "#,
        );

        let filing = FilingParser::new().parse_str(&xml).unwrap();
        assert_eq!(filing.contexts.len(), 1);
        assert_eq!(filing.contexts[0].entity, 999_999);
    }

    #[test]
    fn test_snippet_truncates_display_only() {
        assert_eq!(snippet("short"), "short");
        let long = "y".repeat(150);
        let shown = snippet(&long);
        assert_eq!(shown.len(), 103);
        assert!(shown.ends_with("..."));
    }
}
