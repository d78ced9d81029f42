pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod tabular;
pub mod types;

pub use error::{EtlError, Result};
pub use types::CanonicalRecord;
