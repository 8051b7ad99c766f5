//! Persistence boundary: projection onto the downstream per-CIK table.
//!
//! The warehouse keeps one row per filer with a fixed set of named numeric
//! columns, one per recognized GAAP concept. This module knows that column
//! set and flattens a [`Selection`] into a row shape; casting text values to
//! numeric types and the actual INSERT belong to the sink, not here.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::Selection;

/// Income-statement and cash-flow columns, filled from the date-range
/// context. Order follows the statement of operations top to bottom.
pub const DATE_RANGE_CONCEPTS: &[&str] = &[
    "SalesRevenueNet",
    "CostOfGoodsAndServicesSold",
    "GrossProfit",
    "ResearchAndDevelopmentExpense",
    "SellingGeneralAndAdministrativeExpense",
    "OperatingExpenses",
    "OperatingIncomeLoss",
    "NonoperatingIncomeExpense",
    "IncomeLossFromContinuingOperationsBeforeIncomeTaxesExtraordinaryItemsNoncontrollingInterest",
    "IncomeTaxExpenseBenefit",
    "NetIncomeLoss",
    "EarningsPerShareBasic",
    "EarningsPerShareDiluted",
    "WeightedAverageNumberOfSharesOutstandingBasic",
    "WeightedAverageNumberOfDilutedSharesOutstanding",
    "CommonStockDividendsPerShareDeclared",
    "OtherComprehensiveIncomeLossNetOfTax",
    "ComprehensiveIncomeNetOfTax",
];

/// Balance-sheet columns, filled from the instant context. Order follows the
/// balance sheet: assets, then liabilities, then equity.
pub const INSTANT_CONCEPTS: &[&str] = &[
    "CashAndCashEquivalentsAtCarryingValue",
    "AvailableForSaleSecuritiesCurrent",
    "AccountsReceivableNetCurrent",
    "InventoryNet",
    "DeferredTaxAssetsLiabilitiesNetCurrent",
    "NontradeReceivablesCurrent",
    "AssetsCurrent",
    "AvailableForSaleSecuritiesNoncurrent",
    "PropertyPlantAndEquipmentNet",
    "Goodwill",
    "IntangibleAssetsNetExcludingGoodwill",
    "OtherAssetsNoncurrent",
    "Assets",
    "AccountsPayableCurrent",
    "AccruedLiabilitiesCurrent",
    "DeferredRevenueCurrent",
    "CommercialPaper",
    "LongTermDebtCurrent",
    "LiabilitiesCurrent",
    "DeferredRevenueNoncurrent",
    "LongTermDebtNoncurrent",
    "OtherLiabilitiesNoncurrent",
    "Liabilities",
    "CommonStocksIncludingAdditionalPaidInCapital",
    "RetainedEarningsAccumulatedDeficit",
    "AccumulatedOtherComprehensiveIncomeLossNetOfTax",
    "StockholdersEquity",
    "LiabilitiesAndStockholdersEquity",
];

pub fn is_recognized(concept: &str) -> bool {
    DATE_RANGE_CONCEPTS.contains(&concept) || INSTANT_CONCEPTS.contains(&concept)
}

/// One flat row for the financials table: recognized concepts only, raw text
/// values as extracted from the filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialRow {
    pub cik: u64,
    pub values: BTreeMap<String, String>,
}

impl FinancialRow {
    pub fn from_selection(cik: u64, selection: &Selection) -> Self {
        let mut values = BTreeMap::new();

        if let Some(statement) = &selection.date_range {
            for concept in DATE_RANGE_CONCEPTS {
                if let Some(value) = statement.facts.get(*concept) {
                    values.insert(concept.to_string(), value.clone());
                }
            }
        }
        if let Some(statement) = &selection.instant {
            for concept in INSTANT_CONCEPTS {
                if let Some(value) = statement.facts.get(*concept) {
                    values.insert(concept.to_string(), value.clone());
                }
            }
        }

        Self { cik, values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
