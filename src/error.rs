use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database unreachable after {attempts} attempts: {message}")]
    Connect { attempts: u32, message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No parser registered for key '{0}'")]
    UnknownParser(String),

    #[error("Payload from {location} looks like an HTML page")]
    HtmlPayload { location: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Record from {source_label} has no usable Name")]
    MissingName { source_label: String },
}

impl From<rusqlite::Error> for EtlError {
    fn from(err: rusqlite::Error) -> Self {
        EtlError::Database {
            message: err.to_string(),
        }
    }
}

/// Where a failure sits in the run: only `Connectivity` ends the whole run.
/// `Fetch`, `Parse`, `Config` and `Storage` skip one source; `Record` drops
/// one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connectivity,
    Fetch,
    Parse,
    Config,
    Storage,
    Record,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Fetch => "fetch",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Config => "config",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Record => "record",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::Connect { .. } => ErrorCategory::Connectivity,
            EtlError::Database { .. } => ErrorCategory::Storage,
            EtlError::MissingName { .. } => ErrorCategory::Record,
            EtlError::Http(_) | EtlError::HttpStatus { .. } | EtlError::HtmlPayload { .. } | EtlError::Io(_) => {
                ErrorCategory::Fetch
            }
            EtlError::Json(_)
            | EtlError::Csv(_)
            | EtlError::Xml(_)
            | EtlError::XmlAttr(_)
            | EtlError::MalformedDocument(_) => ErrorCategory::Parse,
            EtlError::Toml(_) | EtlError::Config(_) | EtlError::UnknownParser(_) => ErrorCategory::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
