// 📊 Change-Set Assembler - Material price moves, largest first
//
// compare_snapshots is the single entry point of the comparison core:
// two sequences of rows in, an ordered change-set out. No I/O.

use crate::index::BaselineIndex;
use crate::matcher::{MatchOutcome, PriceDeltaMatcher};
use crate::record::TabularRecord;
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// PRICE CHANGE
// ============================================================================

/// One reported price move
///
/// Prices, delta and percentage are fixed two-decimal text (sign kept on
/// the delta and percentage). The `$`/`%` decoration belongs to the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub product_name: String,
    pub card_number: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub set: String,
    #[serde(default)]
    pub rarity: String,
    pub old_price: String,
    pub new_price: String,
    pub price_change: String,
    pub percentage_change: String,
}

impl PriceChange {
    /// Absolute delta as displayed; used for ordering
    pub fn magnitude(&self) -> f64 {
        self.price_change.parse::<f64>().map(f64::abs).unwrap_or(0.0)
    }
}

// ============================================================================
// COMPARISON STATS
// ============================================================================

/// Where every incoming row ended up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub incoming_rows: usize,
    pub baseline_rows: usize,
    /// Incoming rows that claimed a baseline row
    pub matched: usize,
    /// Incoming rows with no baseline counterpart left
    pub unmatched: usize,
    /// Matched rows skipped for lack of a market price column
    pub missing_price_column: usize,
    pub unchanged: usize,
    pub changed: usize,
    /// Changes by the sign of the unrounded delta
    pub increases: usize,
    pub decreases: usize,
    /// Baseline rows never claimed
    pub baseline_unclaimed: usize,
}

impl ComparisonStats {
    fn record(&mut self, outcome: &MatchOutcome) {
        match outcome {
            MatchOutcome::Changed { delta, .. } => {
                self.matched += 1;
                self.changed += 1;
                if *delta > 0.0 {
                    self.increases += 1;
                } else {
                    self.decreases += 1;
                }
            }
            MatchOutcome::Unchanged => {
                self.matched += 1;
                self.unchanged += 1;
            }
            MatchOutcome::NoPriceColumn => {
                self.matched += 1;
                self.missing_price_column += 1;
            }
            MatchOutcome::NoCounterpart => self.unmatched += 1,
        }
    }
}

// ============================================================================
// CHANGE SET
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<PriceChange>,
    pub stats: ComparisonStats,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn increases(&self) -> usize {
        self.stats.increases
    }

    pub fn decreases(&self) -> usize {
        self.stats.decreases
    }

    /// User-facing result line; an empty set is a success, not an error
    pub fn message(&self) -> String {
        if self.changes.is_empty() {
            "No price changes detected!".to_string()
        } else {
            format!("Found {} price changes!", self.changes.len())
        }
    }
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// Match every incoming row in order, keep material changes, sort them
///
/// Claims are order-sensitive, so rows are visited strictly in input order.
/// The sort is stable: equal magnitudes keep encounter order.
pub fn assemble(new_records: &[TabularRecord], index: &mut BaselineIndex) -> ChangeSet {
    let matcher = PriceDeltaMatcher::new();
    let mut stats = ComparisonStats {
        incoming_rows: new_records.len(),
        baseline_rows: index.total_rows(),
        ..Default::default()
    };
    let mut changes = Vec::new();

    for record in new_records {
        let outcome = matcher.match_outcome(record, index);
        stats.record(&outcome);
        if let Some(change) = outcome.into_change() {
            changes.push(change);
        }
    }

    changes.sort_by(|a, b| b.magnitude().total_cmp(&a.magnitude()));
    stats.baseline_unclaimed = index.unclaimed();

    ChangeSet { changes, stats }
}

/// Compare a new export against the baseline
///
/// Example:
/// ```
/// use price_reconciliation::{compare_snapshots, TabularRecord};
///
/// let old = TabularRecord::new()
///     .with("Product Name", "Base Set Charizard")
///     .with("Card Number", "4")
///     .with("Market Price (As of 2024-01-01)", "300.00");
/// let new = TabularRecord::new()
///     .with("Product Name", "Base Set Charizard")
///     .with("Card Number", "4")
///     .with("Market Price (As of 2024-02-01)", "350.00");
///
/// let change_set = compare_snapshots(&[old], &[new]);
/// assert_eq!(change_set.changes[0].price_change, "50.00");
/// ```
pub fn compare_snapshots(baseline: &[TabularRecord], new_records: &[TabularRecord]) -> ChangeSet {
    let mut index = BaselineIndex::build(baseline);
    let change_set = assemble(new_records, &mut index);

    info!(
        baseline_rows = change_set.stats.baseline_rows,
        incoming_rows = change_set.stats.incoming_rows,
        matched = change_set.stats.matched,
        changed = change_set.stats.changed,
        "price comparison complete"
    );

    change_set
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, header: &str, price: &str) -> TabularRecord {
        TabularRecord::new()
            .with("Product Name", name)
            .with("Card Number", "1")
            .with("Set", "Jungle")
            .with("Card Condition", "NM")
            .with("Date Added", "2024-01-01")
            .with("Quantity", "1")
            .with(header, price)
    }

    fn old(name: &str, price: &str) -> TabularRecord {
        row(name, "Market Price (As of 2024-01-01)", price)
    }

    fn new(name: &str, price: &str) -> TabularRecord {
        row(name, "Market Price (As of 2024-02-01)", price)
    }

    #[test]
    fn test_end_to_end_charizard() {
        let baseline = vec![TabularRecord::new()
            .with("Product Name", "Base Set Charizard")
            .with("Card Number", "4")
            .with("Set", "Base Set")
            .with("Variance", "")
            .with("Grade", "")
            .with("Card Condition", "NM")
            .with("Date Added", "2024-01-01")
            .with("Quantity", "1")
            .with("Market Price (As of 2024-01-01)", "300.00")];
        let incoming = vec![TabularRecord::new()
            .with("Product Name", "Base Set Charizard")
            .with("Card Number", "4")
            .with("Set", "Base Set")
            .with("Variance", "")
            .with("Grade", "")
            .with("Card Condition", "NM")
            .with("Date Added", "2024-01-01")
            .with("Quantity", "1")
            .with("Market Price (As of 2024-02-01)", "350.00")];

        let change_set = compare_snapshots(&baseline, &incoming);

        assert_eq!(change_set.len(), 1);
        let change = &change_set.changes[0];
        assert_eq!(change.old_price, "300.00");
        assert_eq!(change.new_price, "350.00");
        assert_eq!(change.price_change, "50.00");
        assert_eq!(change.percentage_change, "16.67");
        assert_eq!(change_set.message(), "Found 1 price changes!");
    }

    #[test]
    fn test_sort_descending_and_stable() {
        let baseline = vec![
            old("Five", "10.00"),
            old("TwentyA", "10.00"),
            old("TwentyB", "10.00"),
            old("One", "10.00"),
        ];
        let incoming = vec![
            new("Five", "15.00"),
            new("TwentyA", "30.00"),
            new("TwentyB", "-10.00"),
            new("One", "9.00"),
        ];

        let change_set = compare_snapshots(&baseline, &incoming);
        let order: Vec<&str> = change_set
            .changes
            .iter()
            .map(|c| c.product_name.as_str())
            .collect();

        assert_eq!(order, vec!["TwentyA", "TwentyB", "Five", "One"]);
        assert_eq!(change_set.increases(), 2);
        assert_eq!(change_set.decreases(), 2);
    }

    #[test]
    fn test_direction_follows_unrounded_delta() {
        let baseline = vec![old("Pichu", "10.000"), old("Togepi", "10.000")];
        let incoming = vec![new("Pichu", "10.004"), new("Togepi", "9.996")];

        let change_set = compare_snapshots(&baseline, &incoming);

        assert_eq!(change_set.len(), 2);
        assert_eq!(change_set.changes[0].price_change, "0.00");
        assert_eq!(change_set.increases(), 1);
        assert_eq!(change_set.decreases(), 1);
        assert_eq!(change_set.stats.increases, 1);
    }

    #[test]
    fn test_multiplicity_conservation() {
        let baseline = vec![old("Eevee", "2.00"), old("Eevee", "2.00")];
        let incoming = vec![
            new("Eevee", "3.00"),
            new("Eevee", "3.00"),
            new("Eevee", "3.00"),
        ];

        let change_set = compare_snapshots(&baseline, &incoming);

        assert_eq!(change_set.len(), 2);
        assert_eq!(change_set.stats.matched, 2);
        assert_eq!(change_set.stats.unmatched, 1);
        assert_eq!(change_set.stats.baseline_unclaimed, 0);
    }

    #[test]
    fn test_claim_order_first_to_first() {
        let baseline = vec![old("Mew", "10.00"), old("Mew", "20.00")];
        let incoming = vec![new("Mew", "11.00"), new("Mew", "25.00")];

        let change_set = compare_snapshots(&baseline, &incoming);
        let mut pairs: Vec<(&str, &str)> = change_set
            .changes
            .iter()
            .map(|c| (c.old_price.as_str(), c.new_price.as_str()))
            .collect();
        pairs.sort();

        // N1 ↔ B1, N2 ↔ B2; never crossed
        assert_eq!(pairs, vec![("10.00", "11.00"), ("20.00", "25.00")]);
    }

    #[test]
    fn test_no_match_produces_nothing() {
        let baseline = vec![old("Mew", "10.00")];
        let incoming = vec![new("Mewtwo", "99.00")];

        let change_set = compare_snapshots(&baseline, &incoming);

        assert!(change_set.is_empty());
        assert_eq!(change_set.stats.unmatched, 1);
        assert_eq!(change_set.stats.baseline_unclaimed, 1);
        assert_eq!(change_set.message(), "No price changes detected!");
    }

    #[test]
    fn test_idempotence_against_itself() {
        let baseline = vec![
            old("Mew", "10.00"),
            old("Mew", "10.00"),
            old("Snorlax", "garbage"),
            TabularRecord::new(),
        ];

        let change_set = compare_snapshots(&baseline, &baseline);

        assert!(change_set.is_empty());
        assert_eq!(change_set.stats.matched, 4);
        assert_eq!(change_set.stats.unchanged, 3);
        assert_eq!(change_set.stats.missing_price_column, 1);
    }

    #[test]
    fn test_empty_inputs() {
        let change_set = compare_snapshots(&[], &[]);
        assert!(change_set.is_empty());
        assert_eq!(change_set.stats, ComparisonStats::default());
    }

    #[test]
    fn test_price_change_json_shape() {
        let change = PriceChange {
            product_name: "Mew".to_string(),
            card_number: "151".to_string(),
            category: "Pokemon".to_string(),
            set: "151".to_string(),
            rarity: "Rare".to_string(),
            old_price: "1.00".to_string(),
            new_price: "2.00".to_string(),
            price_change: "1.00".to_string(),
            percentage_change: "100.00".to_string(),
        };

        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["productName"], "Mew");
        assert_eq!(json["percentageChange"], "100.00");
        assert!((change.magnitude() - 1.0).abs() < 1e-9);
    }
}
