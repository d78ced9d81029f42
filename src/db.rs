use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{EtlError, Result};
use crate::types::{split_multi, CanonicalRecord};

const MIGRATION_SQL: &str = include_str!("../migrations/001_create_sanctions_tables.sql");

/// Child collections hanging off an entity, each deduplicated per
/// (entity, value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildTable {
    Aliases,
    Nationalities,
    SanctionTypes,
}

impl ChildTable {
    pub const ALL: [ChildTable; 3] = [
        ChildTable::Aliases,
        ChildTable::Nationalities,
        ChildTable::SanctionTypes,
    ];

    pub fn table(self) -> &'static str {
        match self {
            ChildTable::Aliases => "aliases",
            ChildTable::Nationalities => "nationalities",
            ChildTable::SanctionTypes => "sanction_types",
        }
    }

    fn column(self) -> &'static str {
        match self {
            ChildTable::Aliases => "alias_name",
            ChildTable::Nationalities => "nationality",
            ChildTable::SanctionTypes => "sanction_type",
        }
    }

    /// Alias lists are joined with ", " because single aliases may contain
    /// bare commas ("DOE, John"); the other fields split on ",".
    fn separator(self) -> &'static str {
        match self {
            ChildTable::Aliases => ", ",
            ChildTable::Nationalities | ChildTable::SanctionTypes => ",",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityUpsert {
    Created(i64),
    Existing(i64),
}

impl EntityUpsert {
    pub fn id(self) -> i64 {
        match self {
            EntityUpsert::Created(id) | EntityUpsert::Existing(id) => id,
        }
    }
}

/// Row counts for one source load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub entities_created: usize,
    pub entities_matched: usize,
    pub rejected: usize,
    pub aliases: usize,
    pub nationalities: usize,
    pub sanction_types: usize,
}

/// Resolve-or-create the entity keyed by (name, designation, source).
/// Records without a usable name are logged and not persisted.
pub fn insert_entity(conn: &Connection, record: &CanonicalRecord) -> Result<Option<EntityUpsert>> {
    let Some(name) = record.usable_name() else {
        let rejected = EtlError::MissingName {
            source_label: record.source.clone(),
        };
        warn!(category = %rejected.category(), "Skipping record: {}: {:?}", rejected, record);
        return Ok(None);
    };
    let designation = record.designation.as_deref();

    if let Some(id) = find_entity(conn, name, designation, &record.source)? {
        return Ok(Some(EntityUpsert::Existing(id)));
    }

    conn.execute(
        "INSERT INTO sanctioned_entities (name, designation, source) VALUES (?1, ?2, ?3)",
        params![name, designation, &record.source],
    )?;
    let id = conn.last_insert_rowid();
    debug!("Created entity {} ({})", id, name);
    Ok(Some(EntityUpsert::Created(id)))
}

/// Entity id for an exact (name, designation, source) match; a missing
/// designation only matches a missing designation.
pub fn find_entity(
    conn: &Connection,
    name: &str,
    designation: Option<&str>,
    source: &str,
) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT entity_id FROM sanctioned_entities
             WHERE name = ?1 AND designation IS ?2 AND source = ?3",
            params![name, designation, source],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn insert_children(
    conn: &Connection,
    table: ChildTable,
    entity_id: i64,
    value: Option<&str>,
) -> Result<usize> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} (entity_id, {}) VALUES (?1, ?2)",
        table.table(),
        table.column()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut inserted = 0;
    for token in split_multi(value, table.separator()) {
        inserted += stmt.execute(params![entity_id, token])?;
    }
    Ok(inserted)
}

pub fn insert_aliases(conn: &Connection, entity_id: i64, aliases: Option<&str>) -> Result<usize> {
    insert_children(conn, ChildTable::Aliases, entity_id, aliases)
}

pub fn insert_nationalities(
    conn: &Connection,
    entity_id: i64,
    nationalities: Option<&str>,
) -> Result<usize> {
    insert_children(conn, ChildTable::Nationalities, entity_id, nationalities)
}

pub fn insert_sanction_types(
    conn: &Connection,
    entity_id: i64,
    sanction_types: Option<&str>,
) -> Result<usize> {
    insert_children(conn, ChildTable::SanctionTypes, entity_id, sanction_types)
}

/// Values stored for one entity in a child table, in insertion order.
pub fn child_values(conn: &Connection, table: ChildTable, entity_id: i64) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE entity_id = ?1 ORDER BY rowid",
        table.column(),
        table.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![entity_id], |row| row.get::<_, String>(0))?;
    let mut values = Vec::new();
    for value in rows {
        values.push(value?);
    }
    Ok(values)
}

/// SQLite-backed store for normalized entities.
pub struct SanctionsStore {
    conn: Connection,
}

impl SanctionsStore {
    /// Open the configured database, retrying a fixed number of times with a
    /// fixed delay. Running out of attempts is fatal to the run.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let attempts = config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match Self::open(&config.path) {
                Ok(store) => {
                    info!("Connected to database at {}", config.path.display());
                    return Ok(store);
                }
                Err(e) => {
                    warn!(
                        "Database connection attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        info!("Retrying in {} seconds...", config.retry_delay_secs);
                        thread::sleep(Duration::from_secs(config.retry_delay_secs));
                    }
                }
            }
        }

        Err(EtlError::Connect {
            attempts,
            message: last_error,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(MIGRATION_SQL)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Starts the single transaction a source's records are written in.
    pub fn begin_source(&mut self) -> Result<SourceLoad<'_>> {
        Ok(SourceLoad {
            tx: self.conn.transaction()?,
            stats: LoadStats::default(),
        })
    }

    /// Loads and commits `records` in one transaction.
    pub fn load_source(&mut self, records: &[CanonicalRecord]) -> Result<LoadStats> {
        let mut load = self.begin_source()?;
        load.load(records)?;
        load.commit()
    }

    pub fn entity_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM sanctioned_entities", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn child_count(&self, table: ChildTable) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table());
        let count = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn find_entity(&self, name: &str, designation: Option<&str>, source: &str) -> Result<Option<i64>> {
        find_entity(&self.conn, name, designation, source)
    }

    pub fn aliases_for(&self, entity_id: i64) -> Result<Vec<String>> {
        child_values(&self.conn, ChildTable::Aliases, entity_id)
    }

    pub fn nationalities_for(&self, entity_id: i64) -> Result<Vec<String>> {
        child_values(&self.conn, ChildTable::Nationalities, entity_id)
    }

    pub fn sanction_types_for(&self, entity_id: i64) -> Result<Vec<String>> {
        child_values(&self.conn, ChildTable::SanctionTypes, entity_id)
    }
}

/// An open per-source transaction. Dropping it without `commit` rolls back
/// everything written for the source.
pub struct SourceLoad<'a> {
    tx: Transaction<'a>,
    stats: LoadStats,
}

impl SourceLoad<'_> {
    pub fn load(&mut self, records: &[CanonicalRecord]) -> Result<()> {
        for record in records {
            self.load_record(record)?;
        }
        Ok(())
    }

    pub fn load_record(&mut self, record: &CanonicalRecord) -> Result<()> {
        let entity = match insert_entity(&self.tx, record)? {
            Some(entity) => entity,
            None => {
                self.stats.rejected += 1;
                return Ok(());
            }
        };
        match entity {
            EntityUpsert::Created(_) => self.stats.entities_created += 1,
            EntityUpsert::Existing(_) => self.stats.entities_matched += 1,
        }

        let id = entity.id();
        self.stats.aliases += insert_aliases(&self.tx, id, record.alias.as_deref())?;
        self.stats.nationalities += insert_nationalities(&self.tx, id, record.nationality.as_deref())?;
        self.stats.sanction_types += insert_sanction_types(&self.tx, id, record.sanction_type.as_deref())?;
        Ok(())
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn commit(self) -> Result<LoadStats> {
        self.tx.commit()?;
        Ok(self.stats)
    }
}
