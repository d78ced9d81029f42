pub mod ofac;
pub mod sdn;
pub mod swiss;
pub mod un;
pub mod xml;

use std::collections::HashMap;
use std::time::Instant;

use crate::error::{EtlError, Result};
use crate::metrics::ParserMetrics;
use crate::types::CanonicalRecord;

pub use ofac::OfacParser;
pub use sdn::SdnParser;
pub use swiss::SwissParser;
pub use un::UnParser;

/// One issuer format mapped onto [`CanonicalRecord`].
///
/// Implementations are pure: no I/O, same bytes in, same records out. An
/// `Err` means the document as a whole could not be read; a single bad
/// entry gets the parser's fallback values or is left out.
pub trait SourceParser: Send + Sync {
    /// Configuration key this parser answers to.
    fn key(&self) -> &'static str;

    fn parse(&self, bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>>;
}

/// A wrapper that adds metrics to any parser implementation
pub struct MetricsParser<P: SourceParser> {
    inner: P,
}

impl<P: SourceParser> MetricsParser<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: SourceParser> SourceParser for MetricsParser<P> {
    fn key(&self) -> &'static str {
        self.inner.key()
    }

    fn parse(&self, bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>> {
        let start_time = Instant::now();

        match self.inner.parse(bytes, source) {
            Ok(records) => {
                ParserMetrics::record_parse_success(
                    self.inner.key(),
                    records.len(),
                    start_time.elapsed().as_secs_f64(),
                );
                Ok(records)
            }
            Err(e) => {
                ParserMetrics::record_parse_error(self.inner.key());
                Err(e)
            }
        }
    }
}

/// Maps configured parser keys to implementations.
pub struct ParserRegistry {
    parsers: HashMap<String, Box<dyn SourceParser>>,
}

impl ParserRegistry {
    /// Registry with every built-in issuer parser, each wrapped in metrics.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(MetricsParser::new(UnParser)));
        registry.register(Box::new(MetricsParser::new(OfacParser)));
        registry.register(Box::new(MetricsParser::new(SdnParser)));
        registry.register(Box::new(MetricsParser::new(SwissParser)));
        registry
    }

    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register a parser under its own key, replacing any previous one.
    pub fn register(&mut self, parser: Box<dyn SourceParser>) {
        self.parsers.insert(parser.key().to_string(), parser);
    }

    pub fn get(&self, key: &str) -> Option<&dyn SourceParser> {
        self.parsers.get(key).map(|p| p.as_ref())
    }

    pub fn parse(&self, key: &str, bytes: &[u8], source: &str) -> Result<Vec<CanonicalRecord>> {
        let parser = self
            .get(key)
            .ok_or_else(|| EtlError::UnknownParser(key.to_string()))?;
        parser.parse(bytes, source)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.parsers.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
