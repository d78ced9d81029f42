use anyhow::Result;

use sanctions_etl::db::{insert_entity, ChildTable, SanctionsStore};
use sanctions_etl::CanonicalRecord;

fn record() -> CanonicalRecord {
    CanonicalRecord {
        name: Some("Acme Trading LLC".to_string()),
        alias: Some("Acme, Acme Intl".to_string()),
        nationality: Some("Iran, Syria".to_string()),
        designation: Some("entity".to_string()),
        sanction_type: Some("SDGT,NPWMD".to_string()),
        source: "OFAC".to_string(),
    }
}

#[test]
fn test_same_record_twice_is_one_entity() -> Result<()> {
    let mut store = SanctionsStore::open_in_memory()?;
    let first = store.load_source(&[record()])?;
    let second = store.load_source(&[record()])?;

    assert_eq!(first.entities_created, 1);
    assert_eq!(second.entities_created, 0);
    assert_eq!(second.entities_matched, 1);
    assert_eq!(store.entity_count()?, 1);
    assert_eq!(store.child_count(ChildTable::Aliases)?, 2);
    assert_eq!(store.child_count(ChildTable::Nationalities)?, 2);
    assert_eq!(store.child_count(ChildTable::SanctionTypes)?, 2);
    Ok(())
}

#[test]
fn test_record_without_name_is_not_persisted() -> Result<()> {
    let mut store = SanctionsStore::open_in_memory()?;
    let mut nameless = record();
    nameless.name = None;

    assert!(insert_entity(store.connection(), &nameless)?.is_none());

    let stats = store.load_source(&[nameless, record()])?;
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.entities_created, 1);
    assert_eq!(store.entity_count()?, 1);
    Ok(())
}

#[test]
fn test_dedup_key_includes_designation_and_source() -> Result<()> {
    let mut store = SanctionsStore::open_in_memory()?;
    let mut other_source = record();
    other_source.source = "UN".to_string();
    let mut other_designation = record();
    other_designation.designation = Some("individual".to_string());

    let stats = store.load_source(&[record(), other_source, other_designation])?;
    assert_eq!(stats.entities_created, 3);
    assert_eq!(store.entity_count()?, 3);
    Ok(())
}

#[test]
fn test_children_accumulate_on_later_encounters() -> Result<()> {
    let mut store = SanctionsStore::open_in_memory()?;
    store.load_source(&[record()])?;

    let mut later = record();
    later.alias = Some("Acme Intl, Acme Global".to_string());
    later.sanction_type = Some("IRGC".to_string());
    store.load_source(&[later])?;

    let id = store
        .find_entity("Acme Trading LLC", Some("entity"), "OFAC")?
        .expect("entity");
    assert_eq!(store.aliases_for(id)?, vec!["Acme", "Acme Intl", "Acme Global"]);
    assert_eq!(store.sanction_types_for(id)?, vec!["SDGT", "NPWMD", "IRGC"]);
    Ok(())
}
