use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use sanctions_etl::config::{Config, DEFAULT_CONFIG_PATH};
use sanctions_etl::constants;
use sanctions_etl::db::{ChildTable, SanctionsStore};
use sanctions_etl::fetch::{looks_like_html, FeedFetcher};
use sanctions_etl::logging;
use sanctions_etl::metrics;
use sanctions_etl::parser::ParserRegistry;
use sanctions_etl::pipeline::Pipeline;
use sanctions_etl::registry::SourceRegistry;
use sanctions_etl::tabular;

#[derive(Parser)]
#[command(name = "sanctions_etl")]
#[command(about = "Normalize sanctions-list feeds and load them into a local database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, parse and load every configured source
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Only these sources (comma-separated sanction_type labels)
        #[arg(long)]
        only: Option<String>,
    },
    /// Parse a local feed file and print the normalized records as JSON
    Parse {
        /// Parser key (un, ofac, sdn, swiss, tabular)
        #[arg(long)]
        parser: String,
        #[arg(long)]
        file: PathBuf,
        /// Source label written into each record
        #[arg(long, default_value = "local")]
        source: String,
    },
    /// Print row counts for the configured database
    Stats {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// List the available parser keys
    Parsers,
}

fn run(config_path: PathBuf, only: Option<String>) -> anyhow::Result<()> {
    let config = Config::load(&config_path)?;
    let registry = SourceRegistry::load_from_file(&config.sources.file)?;

    let sources = match only {
        Some(list) => {
            let labels: Vec<String> = list.split(',').map(|s| s.trim().to_string()).collect();
            registry.select(&labels)
        }
        None => registry.enabled_sources(),
    };
    if sources.is_empty() {
        warn!("No enabled sources selected from {}", config.sources.file.display());
    }

    let exporter = match &config.metrics.output {
        Some(path) => Some(metrics::install_file_exporter(path)?),
        None => None,
    };

    // The only failure that ends the run early.
    let mut store = match SanctionsStore::connect(&config.database) {
        Ok(store) => store,
        Err(e) => {
            error!(category = %e.category(), "Aborting run: {}", e);
            return Err(e.into());
        }
    };
    println!("Connected to database successfully");

    let parsers = ParserRegistry::new();
    let fetcher = FeedFetcher::new(&config.fetch)?;
    let summary = Pipeline::new(&parsers, &fetcher).run(&mut store, &sources);
    summary.print();
    info!(
        "All sources processed: committed={} skipped={}",
        summary.committed(),
        summary.skipped()
    );

    if let Some(exporter) = exporter {
        if let Err(e) = exporter.write() {
            error!("Failed to write metrics: {}", e);
        }
    }
    Ok(())
}

fn parse_file(parser: &str, file: PathBuf, source: &str) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    if looks_like_html(&bytes) {
        anyhow::bail!("{} looks like an HTML page, not a feed", file.display());
    }

    let records = if parser == constants::TABULAR_PARSER {
        tabular::read_records(&bytes, source)?
    } else {
        ParserRegistry::new().parse(parser, &bytes, source)?
    };
    info!("Parsed {} records from {}", records.len(), file.display());
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn stats(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load(&config_path)?;
    let store = SanctionsStore::connect(&config.database)?;
    println!("sanctioned_entities: {}", store.entity_count()?);
    for table in ChildTable::ALL {
        println!("{}: {}", table.table(), store.child_count(table)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, only } => run(config, only),
        Commands::Parse { parser, file, source } => parse_file(&parser, file, &source),
        Commands::Stats { config } => stats(config),
        Commands::Parsers => {
            for key in constants::get_supported_parsers() {
                println!("{key}");
            }
            Ok(())
        }
    }
}
