//! Per-source orchestration: resolve parser, fetch, validate, parse, load,
//! commit. A failure at any stage skips that source and the run moves on.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info, warn};

use crate::db::{LoadStats, SanctionsStore};
use crate::error::{ErrorCategory, EtlError};
use crate::fetch::{looks_like_html, Fetch};
use crate::metrics::PipelineMetrics;
use crate::parser::{ParserRegistry, SourceParser};
use crate::registry::SourceDescriptor;
use crate::constants::TABULAR_PARSER;
use crate::tabular;
use crate::types::CanonicalRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveParser,
    Fetch,
    ValidateContent,
    Parse,
    Load,
    Commit,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ResolveParser => "resolve_parser",
            Stage::Fetch => "fetch",
            Stage::ValidateContent => "validate_content",
            Stage::Parse => "parse",
            Stage::Load => "load",
            Stage::Commit => "commit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum SourceStatus {
    Committed {
        records: usize,
        stats: LoadStats,
    },
    Skipped {
        stage: Stage,
        category: ErrorCategory,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub parser: String,
    pub status: SourceStatus,
}

impl SourceOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, SourceStatus::Committed { .. })
    }
}

/// Result of a complete run over the configured sources
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<SourceOutcome>,
}

impl RunSummary {
    pub fn committed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_committed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.committed()
    }

    pub fn print(&self) {
        println!("\n📊 Run summary ({} sources)", self.outcomes.len());
        for outcome in &self.outcomes {
            match &outcome.status {
                SourceStatus::Committed { records, stats } => println!(
                    "   ✔ {} [{}]: {} records, {} new entities, {} matched, {} rejected",
                    outcome.source,
                    outcome.parser,
                    records,
                    stats.entities_created,
                    stats.entities_matched,
                    stats.rejected
                ),
                SourceStatus::Skipped {
                    stage,
                    category,
                    reason,
                } => println!(
                    "   ✘ {} [{}]: skipped at {} ({} error): {}",
                    outcome.source, outcome.parser, stage, category, reason
                ),
            }
        }
        let elapsed = self.finished_at - self.started_at;
        println!(
            "   Committed: {}  Skipped: {}  Elapsed: {}s",
            self.committed(),
            self.skipped(),
            elapsed.num_seconds()
        );
    }
}

enum Normalizer<'a> {
    Parser(&'a dyn SourceParser),
    Tabular,
}

struct StageError {
    stage: Stage,
    error: EtlError,
}

fn at(stage: Stage) -> impl Fn(EtlError) -> StageError {
    move |error| StageError { stage, error }
}

pub struct Pipeline<'a> {
    parsers: &'a ParserRegistry,
    fetcher: &'a dyn Fetch,
}

impl<'a> Pipeline<'a> {
    pub fn new(parsers: &'a ParserRegistry, fetcher: &'a dyn Fetch) -> Self {
        Self { parsers, fetcher }
    }

    /// Processes `sources` strictly in order.
    pub fn run(&self, store: &mut SanctionsStore, sources: &[&SourceDescriptor]) -> RunSummary {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            outcomes.push(self.run_source(store, source));
        }
        RunSummary {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    pub fn run_source(&self, store: &mut SanctionsStore, source: &SourceDescriptor) -> SourceOutcome {
        let span = tracing::info_span!("source", source = %source.sanction_type, parser = %source.parser);
        let _enter = span.enter();
        info!("Processing {} with parser '{}'", source.sanction_type, source.parser);

        let status = match self.process(store, source) {
            Ok((records, stats)) => {
                if stats.rejected > 0 {
                    warn!("{} records rejected for {}", stats.rejected, source.sanction_type);
                    PipelineMetrics::record_rejected(&source.sanction_type, stats.rejected);
                }
                PipelineMetrics::record_source_committed(&source.sanction_type, records);
                info!(
                    "Inserted {} records for {} (created={} matched={})",
                    records, source.sanction_type, stats.entities_created, stats.entities_matched
                );
                SourceStatus::Committed { records, stats }
            }
            Err(StageError { stage, error }) => {
                let category = error.category();
                match stage {
                    Stage::ValidateContent => warn!(
                        category = %category,
                        "{} skipped at {}: {}", source.sanction_type, stage, error
                    ),
                    _ => error!(
                        category = %category,
                        "{} skipped at {}: {}", source.sanction_type, stage, error
                    ),
                }
                PipelineMetrics::record_source_skipped(&source.sanction_type, stage.as_str(), category.as_str());
                SourceStatus::Skipped {
                    stage,
                    category,
                    reason: error.to_string(),
                }
            }
        };

        SourceOutcome {
            source: source.sanction_type.clone(),
            parser: source.parser.clone(),
            status,
        }
    }

    fn resolve(&self, key: &str) -> Option<Normalizer<'a>> {
        if key == TABULAR_PARSER {
            return Some(Normalizer::Tabular);
        }
        self.parsers.get(key).map(Normalizer::Parser)
    }

    fn process(
        &self,
        store: &mut SanctionsStore,
        source: &SourceDescriptor,
    ) -> std::result::Result<(usize, LoadStats), StageError> {
        let normalizer = self
            .resolve(&source.parser)
            .ok_or_else(|| EtlError::UnknownParser(source.parser.clone()))
            .map_err(at(Stage::ResolveParser))?;

        let location = source.location().map_err(at(Stage::Fetch))?;
        let bytes = self.fetcher.fetch(&location).map_err(at(Stage::Fetch))?;
        PipelineMetrics::record_fetch_bytes(&source.sanction_type, bytes.len());

        if looks_like_html(&bytes) {
            return Err(StageError {
                stage: Stage::ValidateContent,
                error: EtlError::HtmlPayload {
                    location: location.to_string(),
                },
            });
        }

        let records = normalize(&normalizer, &bytes, &source.sanction_type).map_err(at(Stage::Parse))?;
        info!("Parsed {} records for {}", records.len(), source.sanction_type);

        let mut load = store.begin_source().map_err(at(Stage::Load))?;
        load.load(&records).map_err(at(Stage::Load))?;
        let stats = load.commit().map_err(at(Stage::Commit))?;
        Ok((records.len(), stats))
    }
}

fn normalize(
    normalizer: &Normalizer<'_>,
    bytes: &[u8],
    source: &str,
) -> crate::error::Result<Vec<CanonicalRecord>> {
    match normalizer {
        Normalizer::Parser(parser) => parser.parse(bytes, source),
        Normalizer::Tabular => tabular::read_records(bytes, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::registry::SourceLocation;
    use std::collections::HashMap;

    struct StaticFetcher {
        payloads: HashMap<String, Vec<u8>>,
    }

    impl Fetch for StaticFetcher {
        fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>> {
            self.payloads
                .get(&location.to_string())
                .cloned()
                .ok_or_else(|| EtlError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")))
        }
    }

    fn source(label: &str, parser: &str, url: &str) -> SourceDescriptor {
        SourceDescriptor {
            sanction_type: label.to_string(),
            parser: parser.to_string(),
            url: Some(url.to_string()),
            path: None,
            enabled: true,
        }
    }

    fn skipped_at(outcome: &SourceOutcome) -> Option<(Stage, ErrorCategory)> {
        match outcome.status {
            SourceStatus::Skipped { stage, category, .. } => Some((stage, category)),
            SourceStatus::Committed { .. } => None,
        }
    }

    #[test]
    fn test_each_failure_skips_only_its_source() {
        let mut payloads = HashMap::new();
        payloads.insert(
            "https://un".to_string(),
            b"<L><INDIVIDUALS><INDIVIDUAL><FIRST_NAME>Kim</FIRST_NAME></INDIVIDUAL></INDIVIDUALS></L>".to_vec(),
        );
        payloads.insert(
            "https://html".to_string(),
            b"<!DOCTYPE html><html><body>Service Unavailable</body></html>".to_vec(),
        );
        payloads.insert("https://broken".to_string(), b"<sdnList><sdnEntry>".to_vec());
        let fetcher = StaticFetcher { payloads };
        let parsers = ParserRegistry::new();
        let mut store = SanctionsStore::open_in_memory().unwrap();

        let sources = [
            source("EU", "eu", "https://un"),
            source("Missing", "un", "https://missing"),
            source("HTML", "ofac", "https://html"),
            source("Broken", "ofac", "https://broken"),
            source("UN", "un", "https://un"),
        ];
        let refs: Vec<&SourceDescriptor> = sources.iter().collect();
        let summary = Pipeline::new(&parsers, &fetcher).run(&mut store, &refs);

        let skips: Vec<_> = summary.outcomes.iter().map(skipped_at).collect();
        assert_eq!(
            skips,
            vec![
                Some((Stage::ResolveParser, ErrorCategory::Config)),
                Some((Stage::Fetch, ErrorCategory::Fetch)),
                Some((Stage::ValidateContent, ErrorCategory::Fetch)),
                Some((Stage::Parse, ErrorCategory::Parse)),
                None,
            ]
        );
        assert_eq!(summary.committed(), 1);
        assert_eq!(summary.skipped(), 4);
        assert_eq!(store.entity_count().unwrap(), 1);
    }

    #[test]
    fn test_tabular_key_bypasses_parser_registry() {
        let mut payloads = HashMap::new();
        payloads.insert(
            "https://uk".to_string(),
            b"Name,Alias,Nationality,Designation,SanctionType\nJohn Smith,N/A,British,Director,Asset freeze\n,,,,\n"
                .to_vec(),
        );
        let fetcher = StaticFetcher { payloads };
        let parsers = ParserRegistry::empty();
        let mut store = SanctionsStore::open_in_memory().unwrap();

        let uk = source("UK", "tabular", "https://uk");
        let outcome = Pipeline::new(&parsers, &fetcher).run_source(&mut store, &uk);
        match outcome.status {
            SourceStatus::Committed { records, stats } => {
                assert_eq!(records, 2);
                assert_eq!(stats.entities_created, 1);
                assert_eq!(stats.rejected, 1);
                assert_eq!(stats.aliases, 0);
            }
            other => panic!("unexpected status {other:?}"),
        }
        let id = store.find_entity("John Smith", Some("Director"), "UK").unwrap();
        assert!(id.is_some());
    }
}
