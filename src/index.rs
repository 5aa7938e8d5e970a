// 🗂️ Baseline Index - Identity key → baseline rows, claimed in file order
//
// Duplicate line items are legitimate (same card held in two portfolio
// entries). Each key keeps its rows in input order plus a cursor; claiming
// hands out the row under the cursor and moves it forward. A claim is
// never undone. Invariant: cursor <= rows.len() for every key.

use crate::normalizer::{normalize, PriceExtraction, RecordRole, RowIdentity};
use crate::record::TabularRecord;
use std::collections::HashMap;

/// A baseline row as seen by the matcher
#[derive(Debug, Clone, Copy)]
pub struct BaselineEntry<'a> {
    pub record: &'a TabularRecord,
    pub price: PriceExtraction,
    /// Zero-based position in the baseline dataset
    pub position: usize,
}

#[derive(Debug, Default)]
struct KeySlot<'a> {
    rows: Vec<BaselineEntry<'a>>,
    cursor: usize,
}

/// Comparison-scoped index over one baseline snapshot
///
/// Borrowed from the baseline rows; build a fresh one per comparison.
#[derive(Debug, Default)]
pub struct BaselineIndex<'a> {
    slots: HashMap<RowIdentity, KeySlot<'a>>,
    total_rows: usize,
    claimed: usize,
}

impl<'a> BaselineIndex<'a> {
    /// O(n) in the number of baseline rows
    pub fn build(records: &'a [TabularRecord]) -> Self {
        let mut slots: HashMap<RowIdentity, KeySlot<'a>> = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            let row = normalize(record, RecordRole::Baseline);
            let entry = BaselineEntry {
                record,
                price: row.price,
                position,
            };
            slots.entry(row.identity).or_default().rows.push(entry);
        }

        BaselineIndex {
            slots,
            total_rows: records.len(),
            claimed: 0,
        }
    }

    /// Hand out the next unclaimed baseline row for `key`
    ///
    /// Returns `None` when the key is unknown or exhausted.
    pub fn claim_next(&mut self, key: &RowIdentity) -> Option<BaselineEntry<'a>> {
        let slot = self.slots.get_mut(key)?;
        let entry = *slot.rows.get(slot.cursor)?;
        slot.cursor += 1;
        self.claimed += 1;
        Some(entry)
    }

    /// Rows still available for `key`
    pub fn remaining(&self, key: &RowIdentity) -> usize {
        self.slots
            .get(key)
            .map(|slot| slot.rows.len() - slot.cursor)
            .unwrap_or(0)
    }

    pub fn is_exhausted(&self, key: &RowIdentity) -> bool {
        self.remaining(key) == 0
    }

    /// Number of distinct identity keys
    pub fn key_count(&self) -> usize {
        self.slots.len()
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn claimed(&self) -> usize {
        self.claimed
    }

    /// Baseline rows nobody claimed (dropped from the new export)
    pub fn unclaimed(&self) -> usize {
        self.total_rows - self.claimed
    }
}

// ============================================================================
// TESTS
// ============================================================================
