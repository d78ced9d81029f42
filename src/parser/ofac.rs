//! OFAC SDN list (`sdnList` XML with a versioned default namespace).

use tracing::debug;

use super::xml::{self, Element};
use super::SourceParser;
use crate::constants;
use crate::error::Result;
use crate::types::CanonicalRecord;

pub const UNKNOWN: &str = "Unknown";
/// Alias literal for entries without an `aka`; a string, not an absent value.
pub const NO_ALIAS: &str = "None";

pub struct OfacParser;

impl SourceParser for OfacParser {
    fn key(&self) -> &'static str {
        constants::OFAC_PARSER
    }

    fn parse(&self, bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>> {
        let root = xml::parse_document(bytes)?;
        // The namespace URI changes between published revisions, so take
        // whatever the root element is bound to.
        let q = Qualifier::from_root(&root);
        debug!("OfacParser: namespace={:?}", root.namespace());

        let records = root
            .descendants(&q.name("sdnEntry"))
            .into_iter()
            .map(|entry| entry_record(entry, &q, source))
            .collect();
        Ok(records)
    }
}

struct Qualifier {
    namespace: Option<String>,
}

impl Qualifier {
    fn from_root(root: &Element) -> Self {
        Self {
            namespace: root.namespace().map(str::to_string),
        }
    }

    fn name(&self, local: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{ns}}}{local}"),
            None => local.to_string(),
        }
    }

    fn path(&self, locals: &[&str]) -> String {
        locals
            .iter()
            .map(|l| self.name(l))
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn entry_record(entry: &Element, q: &Qualifier, source: &str) -> CanonicalRecord {
    let first = entry.find_text(&q.name("firstName")).unwrap_or("");
    let last = entry.find_text(&q.name("lastName")).unwrap_or("");
    let full = format!("{first} {last}").trim().to_string();
    let name = if full.is_empty() {
        entry
            .find_text(&q.name("programList"))
            .unwrap_or(UNKNOWN)
            .to_string()
    } else {
        full
    };

    // Only the first aka is consulted; a first aka without a lastName gives
    // NO_ALIAS even when a later aka has one.
    let alias = entry
        .find(&q.path(&["akaList", "aka"]))
        .and_then(|aka| aka.find_text(&q.name("lastName")))
        .unwrap_or(NO_ALIAS);

    let nationality = entry
        .find_text(&q.path(&["nationalityList", "nationality", "country"]))
        .unwrap_or(UNKNOWN);

    let designation = entry.find_text(&q.name("sdnType")).unwrap_or(UNKNOWN);

    let programs: Vec<&str> = entry
        .find_all(&q.path(&["programList", "program"]))
        .into_iter()
        .filter_map(Element::text)
        .collect();
    let sanction_type = if programs.is_empty() {
        UNKNOWN.to_string()
    } else {
        programs.join(", ")
    };

    CanonicalRecord {
        name: Some(name),
        alias: Some(alias.to_string()),
        nationality: Some(nationality.to_string()),
        designation: Some(designation.to_string()),
        sanction_type: Some(sanction_type),
        source: source.to_string(),
    }
}
