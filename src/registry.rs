use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EtlError, Result};

/// One configured feed, as written in `sources.json`.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceDescriptor {
    /// Label stored as the record `Source`, e.g. "UN" or "OFAC".
    pub sanction_type: String,
    pub parser: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(String),
    Path(PathBuf),
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Url(url) => write!(f, "{url}"),
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl SourceDescriptor {
    /// Exactly one of `url` / `path` must be set.
    pub fn location(&self) -> Result<SourceLocation> {
        match (&self.url, &self.path) {
            (Some(url), None) => Ok(SourceLocation::Url(url.clone())),
            (None, Some(path)) => Ok(SourceLocation::Path(path.clone())),
            (Some(_), Some(_)) => Err(EtlError::Config(format!(
                "Source {} sets both url and path",
                self.sanction_type
            ))),
            (None, None) => Err(EtlError::Config(format!(
                "Source {} has neither url nor path",
                self.sanction_type
            ))),
        }
    }
}

/// Ordered list of configured sources.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read sources file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let sources: Vec<SourceDescriptor> = serde_json::from_str(content)?;
        Ok(Self { sources })
    }

    /// Enabled sources in configured order.
    pub fn enabled_sources(&self) -> Vec<&SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }

    /// Enabled sources whose label matches one of `labels` (case-insensitive).
    pub fn select(&self, labels: &[String]) -> Vec<&SourceDescriptor> {
        self.enabled_sources()
            .into_iter()
            .filter(|s| {
                labels
                    .iter()
                    .any(|l| l.eq_ignore_ascii_case(&s.sanction_type))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
