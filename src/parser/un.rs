//! UN Security Council consolidated list.
//!
//! `INDIVIDUAL` and `ENTITY` records are independent groups; individuals are
//! emitted first, then entities, each in document order.

use tracing::debug;

use super::xml::{self, Element};
use super::SourceParser;
use crate::constants;
use crate::error::Result;
use crate::types::CanonicalRecord;

pub const UNKNOWN: &str = "Unknown";
pub const DEFAULT_INDIVIDUAL_DESIGNATION: &str = "individual";
pub const ENTITY_DESIGNATION: &str = "entity";

pub struct UnParser;

impl SourceParser for UnParser {
    fn key(&self) -> &'static str {
        constants::UN_PARSER
    }

    fn parse(&self, bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>> {
        let root = xml::parse_document(bytes)?;

        let individuals = root.descendants("INDIVIDUAL");
        let entities = root.descendants("ENTITY");
        debug!(
            "UnParser: individuals={} entities={}",
            individuals.len(),
            entities.len()
        );

        let mut records = Vec::with_capacity(individuals.len() + entities.len());
        records.extend(individuals.into_iter().map(|i| individual_record(i, source)));
        records.extend(entities.into_iter().map(|e| entity_record(e, source)));
        Ok(records)
    }
}

fn individual_record(individual: &Element, source: &str) -> CanonicalRecord {
    let parts: Vec<&str> = ["FIRST_NAME", "SECOND_NAME", "THIRD_NAME"]
        .iter()
        .filter_map(|tag| individual.find_text(tag))
        .collect();
    let name = if parts.is_empty() {
        UNKNOWN.to_string()
    } else {
        parts.join(" ")
    };

    CanonicalRecord {
        name: Some(name),
        alias: first_alias(individual, "INDIVIDUAL_ALIAS"),
        nationality: Some(first_value_or(individual, "NATIONALITY/VALUE", UNKNOWN)),
        designation: Some(first_value_or(
            individual,
            "DESIGNATION/VALUE",
            DEFAULT_INDIVIDUAL_DESIGNATION,
        )),
        sanction_type: Some(first_value_or(individual, "UN_LIST_TYPE", UNKNOWN)),
        source: source.to_string(),
    }
}

fn entity_record(entity: &Element, source: &str) -> CanonicalRecord {
    // Organisations carry their name in FIRST_NAME, same tag as individuals.
    CanonicalRecord {
        name: Some(first_value_or(entity, "FIRST_NAME", UNKNOWN)),
        alias: first_alias(entity, "ENTITY_ALIAS"),
        nationality: Some(first_value_or(entity, "NATIONALITY/VALUE", UNKNOWN)),
        designation: Some(ENTITY_DESIGNATION.to_string()),
        sanction_type: Some(first_value_or(entity, "UN_LIST_TYPE", UNKNOWN)),
        source: source.to_string(),
    }
}

// Only the first alias block is kept; later ones are dropped.
fn first_alias(record: &Element, alias_tag: &str) -> Option<String> {
    record
        .child(alias_tag)
        .and_then(|alias| alias.find_text("ALIAS_NAME"))
        .map(str::to_string)
}

fn first_value_or(record: &Element, path: &str, fallback: &str) -> String {
    record.find_text(path).unwrap_or(fallback).to_string()
}
