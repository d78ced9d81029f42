//! SESAM-style list (`sanctions-program` / `target` layout), individuals only.
//!
//! Sanctions-set ids on each target are resolved against the English
//! descriptions declared by the programs at the top of the document.

use std::collections::HashMap;

use tracing::debug;

use super::xml::{self, Element};
use super::SourceParser;
use crate::constants;
use crate::error::Result;
use crate::types::CanonicalRecord;

pub const UNKNOWN: &str = "Unknown";
pub const DESIGNATION: &str = "individual";
const DESCRIPTION_LANG: &str = "eng";

pub struct SdnParser;

impl SourceParser for SdnParser {
    fn key(&self) -> &'static str {
        constants::SDN_PARSER
    }

    fn parse(&self, bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>> {
        let root = xml::parse_document(bytes)?;
        let set_names = english_set_descriptions(&root);

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for target in root.children_named("target") {
            match target_record(target, &set_names, source) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        debug!(
            "SdnParser: sets={} individuals={} non_individual_targets={}",
            set_names.len(),
            records.len(),
            skipped
        );
        Ok(records)
    }
}

fn english_set_descriptions(root: &Element) -> HashMap<&str, &str> {
    let mut map = HashMap::new();
    for set in root.find_all("sanctions-program/sanctions-set") {
        if set.attr("lang") != Some(DESCRIPTION_LANG) {
            continue;
        }
        if let Some(ssid) = set.attr("ssid") {
            map.insert(ssid, set.text().unwrap_or(""));
        }
    }
    map
}

fn target_record(
    target: &Element,
    set_names: &HashMap<&str, &str>,
    source: &str,
) -> Option<CanonicalRecord> {
    let individual = target.child("individual")?;

    let sanction_types: Vec<&str> = target
        .children_named("sanctions-set-id")
        .filter_map(Element::text)
        .map(|ssid| set_names.get(ssid).copied().unwrap_or(ssid))
        .collect();
    let sanction_type = if sanction_types.is_empty() {
        UNKNOWN.to_string()
    } else {
        sanction_types.join(", ")
    };

    let name = individual
        .find_text("identity/name/name-part/value")
        .unwrap_or(UNKNOWN);
    let nationality = individual
        .find_text("identity/nationality/country")
        .unwrap_or(UNKNOWN);

    Some(CanonicalRecord {
        name: Some(name.to_string()),
        alias: None,
        nationality: Some(nationality.to_string()),
        designation: Some(DESIGNATION.to_string()),
        sanction_type: Some(sanction_type),
        source: source.to_string(),
    })
}
