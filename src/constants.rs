//! Parser keys accepted in the `parser` field of `sources.json`.

pub const UN_PARSER: &str = "un";
pub const OFAC_PARSER: &str = "ofac";
pub const SDN_PARSER: &str = "sdn";
pub const SWISS_PARSER: &str = "swiss";

// Pre-processed CSV rows; loaded directly rather than through a SourceParser
pub const TABULAR_PARSER: &str = "tabular";

/// Get all supported parser keys, including the tabular path
pub fn get_supported_parsers() -> Vec<&'static str> {
    vec![UN_PARSER, OFAC_PARSER, SDN_PARSER, SWISS_PARSER, TABULAR_PARSER]
}
