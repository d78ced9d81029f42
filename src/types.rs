use serde::{Deserialize, Serialize};

/// Flat record every feed is normalized into before loading.
///
/// Multi-valued fields (`alias`, `nationality`, `sanction_type`) are carried
/// as comma-joined strings; the loader splits them back into rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Alias")]
    pub alias: Option<String>,
    #[serde(rename = "Nationality")]
    pub nationality: Option<String>,
    #[serde(rename = "Designation")]
    pub designation: Option<String>,
    #[serde(rename = "Sanction Type")]
    pub sanction_type: Option<String>,
    #[serde(rename = "Source")]
    pub source: String,
}

impl CanonicalRecord {
    pub fn new(source: &str) -> Self {
        Self {
            name: None,
            alias: None,
            nationality: None,
            designation: None,
            sanction_type: None,
            source: source.to_string(),
        }
    }

    /// The name, if it is present and not blank.
    pub fn usable_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Splits a comma-joined field into trimmed, non-empty tokens, keeping the
/// first occurrence of each value.
pub fn split_multi<'a>(value: Option<&'a str>, separator: &str) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    let Some(value) = value else {
        return out;
    };
    for token in value.split(separator).map(str::trim) {
        if !token.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Joins values with ", ", returning `None` for an empty list.
pub fn join_non_empty<I, S>(values: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = values
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}
