//! Pre-processed tabular feed (CSV) that is loaded without an issuer parser.
//!
//! Rows already carry a predicted `Designation`; the only work here is the
//! column mapping and collapsing null-like cells to absent values.

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::CanonicalRecord;

/// Cell values treated as missing.
pub const NULL_TOKENS: [&str; 4] = ["", "null", "NULL", "N/A"];

#[derive(Debug, Deserialize)]
struct TabularRow {
    #[serde(rename = "Name", default, deserialize_with = "nullable")]
    name: Option<String>,
    #[serde(rename = "Alias", default, deserialize_with = "nullable")]
    alias: Option<String>,
    #[serde(rename = "Nationality", default, deserialize_with = "nullable")]
    nationality: Option<String>,
    #[serde(rename = "Designation", default, deserialize_with = "nullable")]
    designation: Option<String>,
    #[serde(
        rename = "SanctionType",
        alias = "Sanction Type",
        default,
        deserialize_with = "nullable"
    )]
    sanction_type: Option<String>,
    #[serde(rename = "Source", default, deserialize_with = "nullable")]
    source: Option<String>,
}

fn nullable<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(normalize_cell))
}

/// Trims a cell and maps the null tokens to `None`.
pub fn normalize_cell(value: String) -> Option<String> {
    let trimmed = value.trim();
    if NULL_TOKENS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads every row into a record. Unreadable rows are logged and skipped;
/// a missing `Source` column falls back to `source`.
pub fn read_records(bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);

    // Surface a missing or unreadable header as a document-level error.
    let headers = reader.headers()?.clone();
    debug!("Tabular headers: {:?}", headers);

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<TabularRow>().enumerate() {
        match row {
            Ok(row) => records.push(CanonicalRecord {
                name: row.name,
                alias: row.alias,
                nationality: row.nationality,
                designation: row.designation,
                sanction_type: row.sanction_type,
                source: row.source.unwrap_or_else(|| source.to_string()),
            }),
            Err(e) => warn!("Skipping row {} of {}: {}", idx + 1, source, e),
        }
    }
    Ok(records)
}
