// 🔑 Row Normalizer - Identity keys and market prices from raw rows
//
// Every record yields a RowIdentity, even a completely empty one.
// Price extraction can miss (no "Market Price..." column) but never fails.

use crate::record::TabularRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// COLUMN NAMES
// ============================================================================

pub const PRODUCT_NAME: &str = "Product Name";
pub const CARD_NUMBER: &str = "Card Number";
pub const SET: &str = "Set";
pub const VARIANCE: &str = "Variance";
pub const GRADE: &str = "Grade";
pub const CARD_CONDITION: &str = "Card Condition";
pub const DATE_ADDED: &str = "Date Added";
pub const QUANTITY: &str = "Quantity";
pub const CATEGORY: &str = "Category";
pub const RARITY: &str = "Rarity";

/// The price header is `Market Price (As of <date>)`; only the prefix is fixed
pub const MARKET_PRICE_PREFIX: &str = "Market Price";

// ============================================================================
// RECORD ROLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordRole {
    /// Row from the stored snapshot
    Baseline,
    /// Row from the newly uploaded export
    Incoming,
}

impl RecordRole {
    pub fn name(&self) -> &str {
        match self {
            RecordRole::Baseline => "baseline",
            RecordRole::Incoming => "incoming",
        }
    }
}

// ============================================================================
// ROW IDENTITY
// ============================================================================

/// Composite key deciding whether two rows are "the same line item"
///
/// All eight components are trimmed text; missing columns become "".
/// No case folding or other normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowIdentity {
    pub product_name: String,
    pub card_number: String,
    pub set: String,
    pub variance: String,
    pub grade: String,
    pub condition: String,
    pub date_added: String,
    pub quantity: String,
}

impl RowIdentity {
    pub fn from_record(record: &TabularRecord) -> Self {
        let field = |column: &str| record.get(column).unwrap_or("").trim().to_string();

        RowIdentity {
            product_name: field(PRODUCT_NAME),
            card_number: field(CARD_NUMBER),
            set: field(SET),
            variance: field(VARIANCE),
            grade: field(GRADE),
            condition: field(CARD_CONDITION),
            date_added: field(DATE_ADDED),
            quantity: field(QUANTITY),
        }
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.product_name,
            self.card_number,
            self.set,
            self.variance,
            self.grade,
            self.condition,
            self.date_added,
            self.quantity
        )
    }
}

// ============================================================================
// PRICE EXTRACTION
// ============================================================================

/// Result of looking up the market price of a row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceExtraction {
    /// A "Market Price..." column exists; garbled values read as 0
    Found(f64),
    /// No column starting with "Market Price"
    NoPriceColumn,
}

impl PriceExtraction {
    pub fn value(&self) -> Option<f64> {
        match self {
            PriceExtraction::Found(price) => Some(*price),
            PriceExtraction::NoPriceColumn => None,
        }
    }
}

/// Find the dated market price column and read it as a number
pub fn extract_price(record: &TabularRecord) -> PriceExtraction {
    match record.find_by_prefix(MARKET_PRICE_PREFIX) {
        Some((_, raw)) => PriceExtraction::Found(parse_price(raw)),
        None => PriceExtraction::NoPriceColumn,
    }
}

/// Read the longest leading decimal literal of `raw`
///
/// "12.50" → 12.5, " 7 " → 7.0, "3.5 USD" → 3.5, "$4" → 0.0, "" → 0.0.
/// Anything unparseable or non-finite reads as 0.
pub fn parse_price(raw: &str) -> f64 {
    let text = raw.trim();
    let bytes = text.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return 0.0;
    }

    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    match text[..end].parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

// ============================================================================
// NORMALIZED ROW
// ============================================================================

/// A record reduced to what the matcher needs
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub identity: RowIdentity,
    pub price: PriceExtraction,
    pub role: RecordRole,
}

pub fn normalize(record: &TabularRecord, role: RecordRole) -> NormalizedRow {
    NormalizedRow {
        identity: RowIdentity::from_record(record),
        price: extract_price(record),
        role,
    }
}

// ============================================================================
// TESTS
// ============================================================================
