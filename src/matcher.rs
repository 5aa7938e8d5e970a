// 🎯 Price-Delta Matcher - Pair an incoming row with its baseline row
//
// Every exit is a plain outcome. A malformed row degrades to "no match"
// for that row only; it never aborts the comparison.

use crate::changeset::PriceChange;
use crate::index::BaselineIndex;
use crate::normalizer::{
    normalize, RecordRole, CARD_NUMBER, CATEGORY, PRODUCT_NAME, RARITY, SET,
};
use crate::record::TabularRecord;
use tracing::{debug, trace};

/// Differences at or below this are float noise, not repricing
pub const PRICE_TOLERANCE: f64 = 0.001;

/// What happened to one incoming row
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Matched and the price moved by more than the tolerance
    Changed { change: PriceChange, delta: f64 },
    /// Matched, price within tolerance
    Unchanged,
    /// New line item, or every baseline occurrence already claimed
    NoCounterpart,
    /// Matched, but one side has no market price column
    NoPriceColumn,
}

impl MatchOutcome {
    pub fn into_change(self) -> Option<PriceChange> {
        match self {
            MatchOutcome::Changed { change, .. } => Some(change),
            _ => None,
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, MatchOutcome::NoCounterpart)
    }
}

pub struct PriceDeltaMatcher {
    /// Minimum absolute delta (exclusive) for a change to be reported
    pub tolerance: f64,
}

impl PriceDeltaMatcher {
    pub fn new() -> Self {
        PriceDeltaMatcher {
            tolerance: PRICE_TOLERANCE,
        }
    }

    /// Claim the baseline counterpart of `incoming` and compare prices
    ///
    /// The claim happens before the price check, so a row without a price
    /// column still consumes its baseline occurrence.
    pub fn match_outcome(&self, incoming: &TabularRecord, index: &mut BaselineIndex) -> MatchOutcome {
        let row = normalize(incoming, RecordRole::Incoming);
        let identity = &row.identity;

        let baseline = match index.claim_next(identity) {
            Some(entry) => entry,
            None => return MatchOutcome::NoCounterpart,
        };

        let (old_price, new_price) = match (baseline.price.value(), row.price.value()) {
            (Some(old), Some(new)) => (old, new),
            (old, _) => {
                let role = if old.is_none() { RecordRole::Baseline } else { row.role };
                trace!(key = %identity, side = role.name(), "no market price column");
                return MatchOutcome::NoPriceColumn;
            }
        };

        let delta = new_price - old_price;
        if delta.abs() <= self.tolerance {
            return MatchOutcome::Unchanged;
        }

        let percentage = if old_price != 0.0 {
            (delta / old_price) * 100.0
        } else {
            0.0
        };

        debug!(
            product = %identity.product_name,
            card_number = %identity.card_number,
            baseline_row = baseline.position,
            old_price,
            new_price,
            delta,
            "price difference found"
        );

        let text = |column: &str| incoming.get(column).unwrap_or("").to_string();

        MatchOutcome::Changed {
            change: PriceChange {
                product_name: text(PRODUCT_NAME),
                card_number: text(CARD_NUMBER),
                category: text(CATEGORY),
                set: text(SET),
                rarity: text(RARITY),
                old_price: to_fixed_2(old_price),
                new_price: to_fixed_2(new_price),
                price_change: to_fixed_2(delta),
                percentage_change: to_fixed_2(percentage),
            },
            delta,
        }
    }

    /// `Some(change)` only for a material price move
    pub fn match_record(&self, incoming: &TabularRecord, index: &mut BaselineIndex) -> Option<PriceChange> {
        self.match_outcome(incoming, index).into_change()
    }
}

/// Two-decimal text, ties rounded away from zero
///
/// `{:.2}` rounds exact ties to even (10.125 -> "10.12"); price exports
/// expect "10.13". A two-decimal tie is always an odd multiple of 1/8,
/// which is exact in binary, so ties can be detected without error.
pub fn to_fixed_2(value: f64) -> String {
    if value == 0.0 {
        return "0.00".to_string();
    }

    let eighths = value.abs() * 8.0;
    let is_tie = eighths.fract() == 0.0 && eighths % 2.0 == 1.0;
    if !is_tie {
        return format!("{:.2}", value);
    }

    let rounded = (value.abs() * 100.0).ceil() / 100.0;
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{:.2}", sign, rounded)
}

impl Default for PriceDeltaMatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn card(price_header: &str, price: &str) -> TabularRecord {
        TabularRecord::new()
            .with("Product Name", "Base Set Charizard")
            .with("Card Number", "4")
            .with("Category", "Pokemon")
            .with("Set", "Base Set")
            .with("Rarity", "Holo Rare")
            .with("Card Condition", "NM")
            .with("Date Added", "2024-01-01")
            .with("Quantity", "1")
            .with(price_header, price)
    }

    fn old_card(price: &str) -> TabularRecord {
        card("Market Price (As of 2024-01-01)", price)
    }

    fn new_card(price: &str) -> TabularRecord {
        card("Market Price (As of 2024-02-01)", price)
    }

    #[test]
    fn test_material_change_is_reported() {
        let baseline = vec![old_card("300.00")];
        let mut index = BaselineIndex::build(&baseline);
        let matcher = PriceDeltaMatcher::new();

        let change = matcher.match_record(&new_card("350.00"), &mut index).unwrap();

        assert_eq!(change.product_name, "Base Set Charizard");
        assert_eq!(change.category, "Pokemon");
        assert_eq!(change.rarity, "Holo Rare");
        assert_eq!(change.old_price, "300.00");
        assert_eq!(change.new_price, "350.00");
        assert_eq!(change.price_change, "50.00");
        assert_eq!(change.percentage_change, "16.67");
    }

    #[test]
    fn test_price_drop_keeps_sign() {
        let baseline = vec![old_card("40.00")];
        let mut index = BaselineIndex::build(&baseline);

        let change = PriceDeltaMatcher::new()
            .match_record(&new_card("30.00"), &mut index)
            .unwrap();

        assert_eq!(change.price_change, "-10.00");
        assert_eq!(change.percentage_change, "-25.00");
    }

    #[test]
    fn test_tolerance_boundary() {
        let matcher = PriceDeltaMatcher::new();

        // 0.001 exactly is not material
        let baseline = vec![old_card("0")];
        let mut index = BaselineIndex::build(&baseline);
        assert_eq!(
            matcher.match_outcome(&new_card("0.001"), &mut index),
            MatchOutcome::Unchanged
        );

        // 0.0011 is
        let baseline = vec![old_card("0")];
        let mut index = BaselineIndex::build(&baseline);
        assert!(matcher.match_record(&new_card("0.0011"), &mut index).is_some());
    }

    #[test]
    fn test_zero_old_price_gives_zero_percentage() {
        let baseline = vec![old_card("0.00")];
        let mut index = BaselineIndex::build(&baseline);

        let change = PriceDeltaMatcher::new()
            .match_record(&new_card("12.34"), &mut index)
            .unwrap();

        assert_eq!(change.old_price, "0.00");
        assert_eq!(change.price_change, "12.34");
        assert_eq!(change.percentage_change, "0.00");
    }

    #[test]
    fn test_unknown_identity_is_no_counterpart() {
        let baseline = vec![old_card("300.00")];
        let mut index = BaselineIndex::build(&baseline);
        let stranger = new_card("1.00").with("Product Name", "Blastoise");

        assert_eq!(
            PriceDeltaMatcher::new().match_outcome(&stranger, &mut index),
            MatchOutcome::NoCounterpart
        );
        assert_eq!(index.claimed(), 0);
    }

    #[test]
    fn test_missing_price_column_is_skipped_but_claims() {
        let baseline = vec![old_card("300.00"), old_card("300.00")];
        let mut index = BaselineIndex::build(&baseline);
        let matcher = PriceDeltaMatcher::new();

        let priceless: TabularRecord = old_card("0")
            .iter()
            .filter(|(column, _)| !column.starts_with("Market Price"))
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();

        let outcome = matcher.match_outcome(&priceless, &mut index);
        assert_eq!(outcome, MatchOutcome::NoPriceColumn);
        assert!(outcome.is_match());
        assert_eq!(index.claimed(), 1);

        // Second occurrence still available to the next row
        assert!(matcher.match_record(&new_card("310.00"), &mut index).is_some());
    }

    #[test]
    fn test_two_decimal_ties_round_up() {
        let matcher = PriceDeltaMatcher::new();

        let baseline = vec![old_card("10.00")];
        let mut index = BaselineIndex::build(&baseline);
        let change = matcher.match_record(&new_card("10.125"), &mut index).unwrap();
        assert_eq!(change.new_price, "10.13");
        assert_eq!(change.price_change, "0.13");
        assert_eq!(change.percentage_change, "1.25");

        let baseline = vec![old_card("800")];
        let mut index = BaselineIndex::build(&baseline);
        let change = matcher.match_record(&new_card("801"), &mut index).unwrap();
        assert_eq!(change.price_change, "1.00");
        assert_eq!(change.percentage_change, "0.13");

        let baseline = vec![old_card("2.5")];
        let mut index = BaselineIndex::build(&baseline);
        let change = matcher.match_record(&new_card("2.625"), &mut index).unwrap();
        assert_eq!(change.new_price, "2.63");
        assert_eq!(change.price_change, "0.13");
    }

    #[test]
    fn test_to_fixed_2_sign_and_non_ties() {
        assert_eq!(to_fixed_2(-0.125), "-0.13");
        assert_eq!(to_fixed_2(-0.004), "-0.00");
        assert_eq!(to_fixed_2(-0.0), "0.00");
        // 1.005 is stored just below the tie
        assert_eq!(to_fixed_2(1.005), "1.00");
        assert_eq!(to_fixed_2(16.666666), "16.67");
        assert_eq!(to_fixed_2(0.25), "0.25");
    }

    #[test]
    fn test_changed_outcome_keeps_raw_delta() {
        let baseline = vec![old_card("10.000")];
        let mut index = BaselineIndex::build(&baseline);

        match PriceDeltaMatcher::new().match_outcome(&new_card("10.004"), &mut index) {
            MatchOutcome::Changed { change, delta } => {
                assert_eq!(change.price_change, "0.00");
                assert!(delta > 0.0);
            }
            other => panic!("expected a change, got {:?}", other),
        }
    }

    #[test]
    fn test_garbled_new_price_compares_as_zero() {
        let baseline = vec![old_card("5.00")];
        let mut index = BaselineIndex::build(&baseline);

        let change = PriceDeltaMatcher::new()
            .match_record(&new_card("n/a"), &mut index)
            .unwrap();

        assert_eq!(change.new_price, "0.00");
        assert_eq!(change.price_change, "-5.00");
        assert_eq!(change.percentage_change, "-100.00");
    }
}
