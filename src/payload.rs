//! Raw order payload decoding
//!
//! The provider delivers the orders report as a tab-delimited flat file,
//! usually UTF-8 but Windows-1252 for older marketplaces. Local exports used
//! in bypass mode may also be comma-separated or a JSON array of records.
//! Entries are kept in the provider's native `column -> value` shape; the
//! aggregator normalizes them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde_json::Value;
use thiserror::Error;

use crate::dates::DateWindow;

/// One provider row as delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOrderEntry {
    /// 1-based line in the source document (header is line 1)
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl RawOrderEntry {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Decoded payload of one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPayload {
    pub window: DateWindow,
    pub entries: Vec<RawOrderEntry>,
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("delimited parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

/// Decode the provider's tab-delimited flat file
pub fn decode_flat_file(bytes: &[u8]) -> std::result::Result<Vec<RawOrderEntry>, PayloadError> {
    decode_delimited(bytes, b'\t')
}

/// Decode delimited text with a header row.
///
/// Tab-delimited files are read without quote handling: product names in
/// provider files carry bare `"` characters.
pub fn decode_delimited(
    bytes: &[u8],
    delimiter: u8,
) -> std::result::Result<Vec<RawOrderEntry>, PayloadError> {
    let text = decode_text(bytes);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .quoting(delimiter != b'\t')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut entries = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let line = record
            .position()
            .map_or(idx + 2, |p| p.line() as usize);
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.trim().to_string()))
            .collect();
        entries.push(RawOrderEntry { line, fields });
    }

    Ok(entries)
}

/// Decode a JSON array of flat objects
pub fn decode_json(bytes: &[u8]) -> std::result::Result<Vec<RawOrderEntry>, PayloadError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let rows = value
        .as_array()
        .ok_or_else(|| PayloadError::Shape("expected a JSON array of order rows".into()))?;

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let object = row.as_object().ok_or_else(|| {
                PayloadError::Shape(format!("row {} is not a JSON object", idx + 1))
            })?;
            let fields = object
                .iter()
                .map(|(k, v)| (k.clone(), json_scalar(v)))
                .collect();
            Ok(RawOrderEntry {
                line: idx + 1,
                fields,
            })
        })
        .collect()
}

/// Load a local export for bypass mode, picking the decoder by extension
pub fn load_file(path: &Path) -> Result<Vec<RawOrderEntry>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read orders file {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let entries = match extension.as_str() {
        "json" => decode_json(&bytes),
        "csv" => decode_delimited(&bytes, b','),
        _ => decode_flat_file(&bytes),
    }
    .with_context(|| format!("Failed to decode orders file {}", path.display()))?;

    tracing::info!("Loaded {} order rows from {}", entries.len(), path.display());
    Ok(entries)
}

fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

fn json_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT_FILE: &str = "amazon-order-id\tpurchase-date\titem-price\tproduct-name\n\
        111-1\t2024-01-05T10:00:00+00:00\t19.99\tMug \"large\"\n\
        \n\
        111-2\t2024-01-06T11:00:00+00:00\t5.00\tCoaster\n";

    #[test]
    fn test_decode_flat_file() {
        let entries = decode_flat_file(FLAT_FILE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, 2);
        assert_eq!(entries[0].get("amazon-order-id"), Some("111-1"));
        assert_eq!(entries[0].get("product-name"), Some("Mug \"large\""));
        assert_eq!(entries[1].get("item-price"), Some("5.00"));
    }

    #[test]
    fn test_decode_windows_1252() {
        // "Café" with 0xE9
        let bytes = b"amazon-order-id\tproduct-name\n1\tCaf\xe9\n";
        let entries = decode_flat_file(bytes).unwrap();
        assert_eq!(entries[0].get("product-name"), Some("Café"));
    }

    #[test]
    fn test_decode_csv_with_quotes() {
        let csv = "amazon-order-id,product-name\n1,\"Mug, large\"\n";
        let entries = decode_delimited(csv.as_bytes(), b',').unwrap();
        assert_eq!(entries[0].get("product-name"), Some("Mug, large"));
    }

    #[test]
    fn test_decode_json_records() {
        let json = r#"[{"amazon-order-id": "1", "item-price": 12.5, "ship-state": null}]"#;
        let entries = decode_json(json.as_bytes()).unwrap();
        assert_eq!(entries[0].get("item-price"), Some("12.5"));
        assert_eq!(entries[0].get("ship-state"), Some(""));
    }

    #[test]
    fn test_decode_json_rejects_non_array() {
        let err = decode_json(br#"{"amazon-order-id": "1"}"#).unwrap_err();
        assert!(matches!(err, PayloadError::Shape(_)));
    }
}
