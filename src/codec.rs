// 🧾 Tabular Codec - CSV bytes ⇄ TabularDataset, plus the price-change export
//
// Headers are kept byte-for-byte (apart from a leading BOM) because the
// dated "Market Price (As of ...)" header is located by prefix later on.

use crate::changeset::PriceChange;
use crate::record::{TabularDataset, TabularRecord};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

/// Column layout of the downloadable price-change file
pub const EXPORT_HEADERS: [&str; 9] = [
    "Product Name",
    "Card Number",
    "Category",
    "Set",
    "Rarity",
    "Old Price",
    "New Price",
    "Price Change",
    "Percentage Change",
];

const BOM: char = '\u{feff}';

/// Parse CSV bytes; first row is the header
pub fn parse(bytes: &[u8]) -> Result<TabularDataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches(BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();

    for (line_num, result) in reader.records().enumerate() {
        // Line 1 is the header
        let record = result.with_context(|| format!("Failed to parse CSV line {}", line_num + 2))?;

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let row: TabularRecord = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(TabularDataset::new(headers, rows))
}

pub fn parse_file(path: &Path) -> Result<TabularDataset> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    parse(&bytes).with_context(|| format!("Failed to parse CSV file: {}", path.display()))
}

/// Write header row then each record, columns looked up by header name
pub fn serialize(dataset: &TabularDataset) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(&dataset.headers)
        .context("Failed to write CSV header row")?;

    for row in &dataset.rows {
        let fields: Vec<&str> = dataset
            .headers
            .iter()
            .map(|header| row.get(header).unwrap_or(""))
            .collect();
        writer.write_record(&fields).context("Failed to write CSV row")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))
}

/// One export row: currency gets `$`, percentage gets `%`
fn export_row(change: &PriceChange) -> [String; 9] {
    [
        change.product_name.clone(),
        change.card_number.clone(),
        change.category.clone(),
        change.set.clone(),
        change.rarity.clone(),
        format!("${}", change.old_price),
        format!("${}", change.new_price),
        format!("${}", change.price_change),
        format!("{}%", change.percentage_change),
    ]
}

/// Render a change-set as the downloadable CSV
pub fn export_price_changes(changes: &[PriceChange]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(EXPORT_HEADERS)
        .context("Failed to write export header row")?;

    for change in changes {
        writer
            .write_record(export_row(change))
            .context("Failed to write export row")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush export writer: {}", e))
}

/// `price_changes_2024-02-01.csv`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("price_changes_{}.csv", date.format("%Y-%m-%d"))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_dated_header() {
        let csv = "Product Name,Card Number,Market Price (As of 2024-02-01)\n\
                   Charizard,4,350.00\n\
                   Blastoise,2,120.50\n";

        let dataset = parse(csv.as_bytes()).unwrap();

        assert_eq!(dataset.headers[2], "Market Price (As of 2024-02-01)");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows[1].get("Product Name"), Some("Blastoise"));
        assert_eq!(
            dataset.rows[0].find_by_prefix("Market Price"),
            Some(("Market Price (As of 2024-02-01)", "350.00"))
        );
    }

    #[test]
    fn test_parse_strips_bom_and_pads_short_rows() {
        let csv = "\u{feff}Product Name,Card Number,Notes\nPikachu,25\n";

        let dataset = parse(csv.as_bytes()).unwrap();

        assert_eq!(dataset.headers[0], "Product Name");
        assert_eq!(dataset.rows[0].get("Card Number"), Some("25"));
        assert_eq!(dataset.rows[0].get("Notes"), Some(""));
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let csv = "Product Name,Card Number\nPikachu,25\n,\nEevee,133\n";

        let dataset = parse(csv.as_bytes()).unwrap();

        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_serialize_then_parse_preserves_headers() {
        let csv = "Product Name,Notes,Market Price (As of 2024-01-01)\n\"Mew, promo\",\"said \"\"hi\"\"\",1.00\n";
        let dataset = parse(csv.as_bytes()).unwrap();

        let bytes = serialize(&dataset).unwrap();
        let again = parse(&bytes).unwrap();

        assert_eq!(again, dataset);
        assert_eq!(again.rows[0].get("Product Name"), Some("Mew, promo"));
    }

    #[test]
    fn test_export_decorates_values() {
        let changes = vec![PriceChange {
            product_name: "Charizard".to_string(),
            card_number: "4".to_string(),
            category: "Pokemon".to_string(),
            set: "Base Set".to_string(),
            rarity: "Holo Rare".to_string(),
            old_price: "300.00".to_string(),
            new_price: "350.00".to_string(),
            price_change: "50.00".to_string(),
            percentage_change: "16.67".to_string(),
        }];

        let bytes = export_price_changes(&changes).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("Product Name,Card Number,Category,Set,Rarity,Old Price,New Price,Price Change,Percentage Change")
        );
        assert_eq!(
            lines.next(),
            Some("Charizard,4,Pokemon,Base Set,Holo Rare,$300.00,$350.00,$50.00,16.67%")
        );
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(export_file_name(date), "price_changes_2024-02-01.csv");
    }
}
