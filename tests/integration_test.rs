use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use sanctions_etl::config::{DatabaseConfig, FetchConfig};
use sanctions_etl::db::{ChildTable, SanctionsStore};
use sanctions_etl::error::ErrorCategory;
use sanctions_etl::fetch::FeedFetcher;
use sanctions_etl::parser::ParserRegistry;
use sanctions_etl::pipeline::{Pipeline, SourceStatus, Stage};
use sanctions_etl::registry::SourceDescriptor;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn local_source(label: &str, parser: &str, path: PathBuf) -> SourceDescriptor {
    SourceDescriptor {
        sanction_type: label.to_string(),
        parser: parser.to_string(),
        url: None,
        path: Some(path),
        enabled: true,
    }
}

fn open_store(dir: &Path) -> Result<SanctionsStore> {
    let config = DatabaseConfig {
        path: dir.join("sanctions.db"),
        max_retries: 1,
        retry_delay_secs: 0,
    };
    Ok(SanctionsStore::connect(&config)?)
}

#[test]
fn test_un_fixture_end_to_end() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut store = open_store(temp_dir.path())?;
    let parsers = ParserRegistry::new();
    let fetcher = FeedFetcher::new(&FetchConfig::default())?;

    let un = local_source("UN", "un", fixture("un_two_records.xml"));
    let summary = Pipeline::new(&parsers, &fetcher).run(&mut store, &[&un]);

    assert_eq!(summary.committed(), 1);
    assert_eq!(store.entity_count()?, 2);

    let individual = store
        .find_entity("Unknown", Some("individual"), "UN")?
        .expect("individual row");
    assert_eq!(store.sanction_types_for(individual)?, vec!["DPRK"]);
    assert_eq!(
        store.nationalities_for(individual)?,
        vec!["Democratic People's Republic of Korea"]
    );
    assert!(store.aliases_for(individual)?.is_empty());

    let entity = store
        .find_entity("KOREA MINING DEVELOPMENT TRADING CORPORATION", Some("entity"), "UN")?
        .expect("entity row");
    assert_eq!(store.aliases_for(entity)?, vec!["CHANGGWANG SINYONG CORPORATION"]);
    assert_eq!(store.nationalities_for(entity)?, vec!["Unknown"]);
    Ok(())
}

#[test]
fn test_rerun_adds_no_rows() -> Result<()> {
    let temp_dir = tempdir()?;
    let parsers = ParserRegistry::new();
    let fetcher = FeedFetcher::new(&FetchConfig::default())?;
    let sources = [
        local_source("UN", "un", fixture("un_two_records.xml")),
        local_source("OFAC", "ofac", fixture("ofac_sdn.xml")),
    ];
    let refs: Vec<&SourceDescriptor> = sources.iter().collect();

    {
        let mut store = open_store(temp_dir.path())?;
        Pipeline::new(&parsers, &fetcher).run(&mut store, &refs);
    }
    let mut store = open_store(temp_dir.path())?;
    let entities = store.entity_count()?;
    let aliases = store.child_count(ChildTable::Aliases)?;
    let sanction_types = store.child_count(ChildTable::SanctionTypes)?;

    let summary = Pipeline::new(&parsers, &fetcher).run(&mut store, &refs);
    assert_eq!(summary.committed(), 2);
    for outcome in &summary.outcomes {
        match &outcome.status {
            SourceStatus::Committed { stats, .. } => {
                assert_eq!(stats.entities_created, 0, "{}", outcome.source);
                assert_eq!(stats.aliases + stats.nationalities + stats.sanction_types, 0);
            }
            other => panic!("{} not committed: {:?}", outcome.source, other),
        }
    }
    assert_eq!(store.entity_count()?, entities);
    assert_eq!(store.child_count(ChildTable::Aliases)?, aliases);
    assert_eq!(store.child_count(ChildTable::SanctionTypes)?, sanction_types);
    Ok(())
}

#[test]
fn test_ofac_fixture_loads_programs_and_literal_alias() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut store = open_store(temp_dir.path())?;
    let parsers = ParserRegistry::new();
    let fetcher = FeedFetcher::new(&FetchConfig::default())?;

    let ofac = local_source("OFAC", "ofac", fixture("ofac_sdn.xml"));
    Pipeline::new(&parsers, &fetcher).run(&mut store, &[&ofac]);

    let airline = store
        .find_entity("AEROCARIBBEAN AIRLINES", Some("Entity"), "OFAC")?
        .expect("airline row");
    assert_eq!(store.aliases_for(airline)?, vec!["AERO-CARIBBEAN"]);
    assert_eq!(store.sanction_types_for(airline)?, vec!["CUBA"]);

    let person = store
        .find_entity("Saddam HUSSEIN AL-TIKRITI", Some("Individual"), "OFAC")?
        .expect("individual row");
    assert_eq!(store.aliases_for(person)?, vec!["None"]);
    assert_eq!(store.nationalities_for(person)?, vec!["Iraq"]);
    assert_eq!(store.sanction_types_for(person)?, vec!["IRAQ2", "SDGT"]);
    Ok(())
}

#[test]
fn test_same_document_through_sdn_and_swiss_parsers() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut store = open_store(temp_dir.path())?;
    let parsers = ParserRegistry::new();
    let fetcher = FeedFetcher::new(&FetchConfig::default())?;

    let seco = local_source("SECO", "sdn", fixture("seco.xml"));
    let swiss = local_source("Swiss", "swiss", fixture("seco.xml"));
    let summary = Pipeline::new(&parsers, &fetcher).run(&mut store, &[&seco, &swiss]);

    match &summary.outcomes[0].status {
        SourceStatus::Committed { records, stats } => {
            assert_eq!(*records, 1);
            assert_eq!(stats.entities_created, 1);
        }
        other => panic!("sdn source not committed: {other:?}"),
    }
    match &summary.outcomes[1].status {
        SourceStatus::Committed { records, stats } => {
            assert_eq!(*records, 2);
            assert_eq!(stats.entities_created, 1);
            assert_eq!(stats.rejected, 1);
        }
        other => panic!("swiss source not committed: {other:?}"),
    }

    let sdn_row = store
        .find_entity("Rami Makhlouf", Some("individual"), "SECO")?
        .expect("sdn row");
    assert_eq!(
        store.sanction_types_for(sdn_row)?,
        vec!["Financial sanctions", "Travel ban", "entry restrictions"]
    );

    let swiss_row = store
        .find_entity("Rami Makhlouf", Some("Financial sanctions"), "Swiss")?
        .expect("swiss row");
    assert_eq!(store.sanction_types_for(swiss_row)?, vec!["Individual"]);
    assert_eq!(store.aliases_for(swiss_row)?, vec!["Rami Makhluf"]);
    Ok(())
}

#[test]
fn test_tabular_source_and_missing_file() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut store = open_store(temp_dir.path())?;
    let parsers = ParserRegistry::new();
    let fetcher = FeedFetcher::new(&FetchConfig::default())?;

    let uk = local_source("UK", "tabular", fixture("uk_predicted.csv"));
    let missing = local_source("EU", "un", temp_dir.path().join("absent.xml"));
    let summary = Pipeline::new(&parsers, &fetcher).run(&mut store, &[&missing, &uk]);

    match &summary.outcomes[0].status {
        SourceStatus::Skipped { stage, category, .. } => {
            assert_eq!(*stage, Stage::Fetch);
            assert_eq!(*category, ErrorCategory::Fetch);
        }
        other => panic!("missing file should be skipped: {other:?}"),
    }
    match &summary.outcomes[1].status {
        SourceStatus::Committed { records, stats } => {
            assert_eq!(*records, 3);
            assert_eq!(stats.entities_created, 1);
            assert_eq!(stats.entities_matched, 1);
            assert_eq!(stats.rejected, 1);
            assert_eq!(stats.aliases, 2);
            assert_eq!(stats.nationalities, 2);
            assert_eq!(stats.sanction_types, 2);
        }
        other => panic!("tabular source not committed: {other:?}"),
    }

    let id = store
        .find_entity("Ivan Ivanov", Some("Director"), "UK")?
        .expect("uk row");
    assert_eq!(store.aliases_for(id)?, vec!["Vanya", "Ivanov I."]);
    assert_eq!(store.nationalities_for(id)?, vec!["Russia", "Belarus"]);
    Ok(())
}
