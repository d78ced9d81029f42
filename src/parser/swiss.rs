//! Swiss SECO consolidated list.
//!
//! Same document layout as the SESAM feed, read differently: the designation
//! comes from the first resolvable sanctions-set label (text before the
//! first comma) and only the main identity of each target is consulted.

use std::collections::HashMap;

use tracing::debug;

use super::xml::{self, Element};
use super::SourceParser;
use crate::constants;
use crate::error::Result;
use crate::types::{join_non_empty, CanonicalRecord};

/// Sanction type written on every record this parser emits.
pub const MAIN_SANCTION_TYPE: &str = "Individual";
const PRIMARY_NAME: &str = "primary-name";

pub struct SwissParser;

impl SourceParser for SwissParser {
    fn key(&self) -> &'static str {
        constants::SWISS_PARSER
    }

    fn parse(&self, bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>> {
        let root = xml::parse_document(bytes)?;
        let labels = set_labels(&root);

        let records: Vec<CanonicalRecord> = root
            .children_named("target")
            .map(|target| target_record(target, &labels, source))
            .collect();
        debug!("SwissParser: sets={} targets={}", labels.len(), records.len());
        Ok(records)
    }
}

// Every language is taken; a later set with the same ssid replaces an earlier one.
fn set_labels(root: &Element) -> HashMap<&str, &str> {
    let mut map = HashMap::new();
    for set in root.find_all("sanctions-program/sanctions-set") {
        if let Some(ssid) = set.attr("ssid") {
            map.insert(ssid, set.text().unwrap_or(""));
        }
    }
    map
}

fn designation(target: &Element, labels: &HashMap<&str, &str>) -> Option<String> {
    target
        .children_named("sanctions-set-id")
        .filter_map(Element::text)
        .find_map(|ssid| labels.get(ssid))
        .map(|label| label.split(',').next().unwrap_or("").trim().to_string())
}

fn name_value(name: &Element) -> Option<&str> {
    name.child("name-part").and_then(|part| part.find_text("value"))
}

fn target_record(target: &Element, labels: &HashMap<&str, &str>, source: &str) -> CanonicalRecord {
    let mut record = CanonicalRecord::new(source);
    record.designation = designation(target, labels);
    record.sanction_type = Some(MAIN_SANCTION_TYPE.to_string());

    let identity = target
        .child("individual")
        .and_then(|individual| {
            individual
                .children_named("identity")
                .find(|identity| identity.attr("main") == Some("true"))
        });
    let Some(identity) = identity else {
        return record;
    };

    // Only the first primary-name counts, even when it carries no value.
    record.name = identity
        .children_named("name")
        .find(|name| name.attr("name-type") == Some(PRIMARY_NAME))
        .and_then(name_value)
        .map(str::to_string);

    let mut aliases = Vec::new();
    for name in identity.children_named("name") {
        if name.attr("name-type") == Some(PRIMARY_NAME) {
            continue;
        }
        if let Some(alias) = name_value(name) {
            aliases.push(alias);
        }
    }
    record.alias = join_non_empty(aliases);

    let countries: Vec<&str> = identity
        .find_all("nationality/country")
        .into_iter()
        .filter_map(Element::text)
        .collect();
    record.nationality = join_non_empty(countries);

    record
}
