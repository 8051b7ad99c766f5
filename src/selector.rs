//! Context classification and statement fact selection.
//!
//! A filing carries dozens of contexts: prior-year comparatives, segment
//! breakdowns, per-share scenarios, sometimes other entities entirely. This
//! module decides which single date-range context holds the current-period
//! income/cash-flow statement and which single instant context holds the
//! balance sheet.

use log::{debug, warn};

use crate::model::{
    DocumentProfile, FactSet, Period, ReportingContext, Selection, SelectionConflict,
    StatementFacts, StatementKind,
};
use crate::parser::ParsedFiling;

/// Concepts whose presence marks a context as a primary-statement candidate
/// rather than a segment or footnote context. OR semantics. This is a
/// tunable heuristic, not anything the XBRL standard mandates.
pub const GATE_CONCEPTS: [&str; 2] = [
    "NetIncomeLoss",
    "CashAndCashEquivalentsAtCarryingValue",
];

/// An instant context is only taken as the balance sheet when it carries a
/// cash position.
pub const BALANCE_SHEET_GATE: &str = "CashAndCashEquivalentsAtCarryingValue";

/// A context needs more facts than this to plausibly hold a full statement;
/// sparse contexts are per-line-item breakouts.
pub const MIN_STATEMENT_FACTS: usize = 15;

/// Run selection over a parsed filing.
///
/// Contexts are visited in document order, so the keep-first rule on
/// conflicting candidates is deterministic. An empty selection means no
/// context qualified; that is a data-quality signal for the caller, not an
/// error.
pub fn select(filing: &ParsedFiling, profile: &DocumentProfile) -> Selection {
    let bounds = profile.kind.span_bounds();
    let mut selection = Selection::default();

    for context in &filing.contexts {
        if context.entity != profile.cik {
            debug!(
                "context {}: entity {} is not the filer ({}), skipping",
                context.id, context.entity, profile.cik
            );
            continue;
        }

        let Some(facts) = filing.facts_by_context.get(&context.id) else {
            continue;
        };
        if !GATE_CONCEPTS.iter().any(|c| facts.contains_key(*c)) {
            continue;
        }

        // Anchor to the current reporting period; comparatives from prior
        // years share the document but end on different dates.
        if context.period.end() != profile.period_end {
            debug!(
                "context {}: period ends {} not {}, skipping",
                context.id,
                context.period.end(),
                profile.period_end
            );
            continue;
        }

        match &context.period {
            Period::Duration { .. } => {
                let span = context.period.span_days().unwrap_or(0);
                if facts.len() > MIN_STATEMENT_FACTS && bounds.contains(&span) {
                    debug!(
                        "context {}: date range of {span} days with {} facts",
                        context.id,
                        facts.len()
                    );
                    place(
                        &mut selection.date_range,
                        &mut selection.conflicts,
                        StatementKind::DateRange,
                        context,
                        facts,
                    );
                }
            }
            Period::Instant { .. } => {
                if facts.contains_key(BALANCE_SHEET_GATE) && facts.len() > MIN_STATEMENT_FACTS {
                    debug!("context {}: instant with {} facts", context.id, facts.len());
                    place(
                        &mut selection.instant,
                        &mut selection.conflicts,
                        StatementKind::Instant,
                        context,
                        facts,
                    );
                }
            }
        }
    }

    selection
}

/// Fill a statement slot, or record a conflict if it is already taken.
/// Never overwrites silently: a second qualifying context means the
/// heuristics matched more than they should, which a human needs to see.
fn place(
    slot: &mut Option<StatementFacts>,
    conflicts: &mut Vec<SelectionConflict>,
    kind: StatementKind,
    context: &ReportingContext,
    facts: &FactSet,
) {
    match slot {
        Some(existing) => {
            warn!(
                "already selected {:?} context {}, ignoring qualifying context {}",
                kind, existing.context_id, context.id
            );
            conflicts.push(SelectionConflict {
                kind,
                kept: existing.context_id.clone(),
                ignored: context.id.clone(),
            });
        }
        None => {
            *slot = Some(StatementFacts {
                context_id: context.id.clone(),
                period: context.period.clone(),
                facts: facts.clone(),
            });
        }
    }
}
