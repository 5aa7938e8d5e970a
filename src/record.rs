// 📄 Tabular Records - Flat string-keyed rows from a spreadsheet export
// Column order is kept exactly as the source had it

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ============================================================================
// TABULAR RECORD
// ============================================================================

/// One row of a catalogue export: `(column, value)` pairs in source order
///
/// Values are always text. Numbers and booleans coming from JSON are kept
/// in their textual form, never reformatted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularRecord {
    cells: Vec<(String, String)>,
}

impl TabularRecord {
    pub fn new() -> Self {
        TabularRecord { cells: Vec::new() }
    }

    /// Builder-style insert, mostly for tests and fixtures
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column, replacing in place if it already exists
    pub fn insert(&mut self, column: &str, value: &str) {
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.cells.push((column.to_string(), value.to_string())),
        }
    }

    /// Exact-name lookup
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// First column (in record order) whose name starts with `prefix`
    ///
    /// The market price header carries a date stamp, e.g.
    /// `Market Price (As of 2024-02-01)`, so it can only be found by prefix.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<(&str, &str)> {
        self.cells
            .iter()
            .find(|(name, _)| name.starts_with(prefix))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, String)> for TabularRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut record = TabularRecord::new();
        for (column, value) in iter {
            record.insert(&column, &value);
        }
        record
    }
}

/// Render a JSON cell the way a spreadsheet export would show it
fn cell_text(column: &str, value: Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) | Value::Object(_) => Err(format!(
            "column '{}' holds a nested value; rows must be flat",
            column
        )),
    }
}

impl TryFrom<Map<String, Value>> for TabularRecord {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut record = TabularRecord::new();
        for (column, value) in map {
            let text = cell_text(&column, value)?;
            record.cells.push((column, text));
        }
        Ok(record)
    }
}

impl Serialize for TabularRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TabularRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        TabularRecord::try_from(map).map_err(D::Error::custom)
    }
}

// ============================================================================
// TABULAR DATASET
// ============================================================================

/// A whole sheet: ordered headers plus rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularDataset {
    pub headers: Vec<String>,
    pub rows: Vec<TabularRecord>,
}

impl TabularDataset {
    pub fn new(headers: Vec<String>, rows: Vec<TabularRecord>) -> Self {
        TabularDataset { headers, rows }
    }

    /// Build from records alone; headers are the union of all columns in
    /// first-appearance order
    pub fn from_records(rows: Vec<TabularRecord>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.columns() {
                if !headers.iter().any(|h| h == column) {
                    headers.push(column.to_string());
                }
            }
        }
        TabularDataset { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = TabularRecord::new()
            .with("Product Name", "Pikachu")
            .with("Quantity", "1");

        record.insert("Product Name", "Raichu");

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("Product Name"), Some("Raichu"));
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["Product Name", "Quantity"]);
    }

    #[test]
    fn test_find_by_prefix_returns_first_in_order() {
        let record = TabularRecord::new()
            .with("Product Name", "Charizard")
            .with("Market Price (As of 2024-01-01)", "300.00")
            .with("Market Price Override", "1.00");

        let (column, value) = record.find_by_prefix("Market Price").unwrap();
        assert_eq!(column, "Market Price (As of 2024-01-01)");
        assert_eq!(value, "300.00");

        assert!(record.find_by_prefix("Average Cost").is_none());
    }

    #[test]
    fn test_json_cells_become_text() {
        let json = r#"{"Product Name":"Mew","Card Number":151,"Watchlist":false,"Notes":null,"Market Price (As of 2024-02-01)":12.5}"#;
        let record: TabularRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.get("Card Number"), Some("151"));
        assert_eq!(record.get("Watchlist"), Some("false"));
        assert_eq!(record.get("Notes"), Some(""));
        assert_eq!(record.get("Market Price (As of 2024-02-01)"), Some("12.5"));
        // Key order survives deserialization
        assert_eq!(record.columns().next(), Some("Product Name"));
    }

    #[test]
    fn test_nested_json_is_rejected() {
        let json = r#"{"Product Name":"Mew","Tags":["promo"]}"#;
        let result: Result<TabularRecord, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_keeps_column_order() {
        let record = TabularRecord::new()
            .with("Set", "Base Set")
            .with("Product Name", "Charizard");

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Set":"Base Set","Product Name":"Charizard"}"#);
    }

    #[test]
    fn test_dataset_headers_from_records() {
        let rows = vec![
            TabularRecord::new().with("A", "1").with("B", "2"),
            TabularRecord::new().with("B", "3").with("C", "4"),
        ];

        let dataset = TabularDataset::from_records(rows);
        assert_eq!(dataset.headers, vec!["A", "B", "C"]);
        assert_eq!(dataset.len(), 2);
    }
}
