//! Run metrics.
//!
//! Everything goes through the `metrics` facade, so without an installed
//! recorder these calls are no-ops. `install_file_exporter` installs a
//! Prometheus recorder whose rendering is written out once the run ends.

use std::fs;
use std::path::{Path, PathBuf};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{EtlError, Result};

/// Metrics collection for the parse phase
pub struct ParserMetrics;

impl ParserMetrics {
    pub fn record_parse_success(parser: &str, records_produced: usize, duration_secs: f64) {
        ::metrics::counter!("sanctions_parser_documents_total", "parser" => parser.to_string())
            .increment(1);
        ::metrics::counter!("sanctions_parser_records_total", "parser" => parser.to_string())
            .increment(records_produced as u64);
        ::metrics::histogram!("sanctions_parser_duration_seconds", "parser" => parser.to_string())
            .record(duration_secs);
    }

    pub fn record_parse_error(parser: &str) {
        ::metrics::counter!("sanctions_parser_errors_total", "parser" => parser.to_string())
            .increment(1);
    }
}

/// Metrics collection for the per-source pipeline
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_source_committed(source: &str, records: usize) {
        ::metrics::counter!("sanctions_sources_committed_total", "source" => source.to_string())
            .increment(1);
        ::metrics::histogram!("sanctions_records_per_source", "source" => source.to_string())
            .record(records as f64);
    }

    pub fn record_source_skipped(source: &str, stage: &'static str, category: &'static str) {
        ::metrics::counter!(
            "sanctions_sources_skipped_total",
            "source" => source.to_string(),
            "stage" => stage,
            "category" => category
        )
        .increment(1);
    }

    pub fn record_fetch_bytes(source: &str, bytes: usize) {
        ::metrics::histogram!("sanctions_fetch_bytes", "source" => source.to_string())
            .record(bytes as f64);
    }

    pub fn record_rejected(source: &str, count: usize) {
        ::metrics::counter!("sanctions_records_rejected_total", "source" => source.to_string())
            .increment(count as u64);
    }
}

/// Prometheus text rendering written to a file after the run.
pub struct FileExporter {
    handle: PrometheusHandle,
    output: PathBuf,
}

pub fn install_file_exporter(output: &Path) -> Result<FileExporter> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EtlError::Config(format!("Failed to install metrics recorder: {e}")))?;
    Ok(FileExporter {
        handle,
        output: output.to_path_buf(),
    })
}

impl FileExporter {
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.output, self.handle.render())?;
        tracing::info!("Wrote metrics to {}", self.output.display());
        Ok(())
    }
}
