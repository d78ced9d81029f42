use std::fs;
use std::time::Duration;

use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::error::{EtlError, Result};
use crate::registry::SourceLocation;

/// Resolves a source location to raw bytes.
pub trait Fetch {
    fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>>;
}

/// HTTP (blocking) and local-file fetcher.
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EtlError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes()?.to_vec())
    }
}

impl Fetch for FeedFetcher {
    fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>> {
        let bytes = match location {
            SourceLocation::Url(url) => self.get(url)?,
            SourceLocation::Path(path) => fs::read(path)?,
        };
        info!(
            "Fetched {} bytes from {} sha256={}",
            bytes.len(),
            location,
            payload_digest(&bytes)
        );
        Ok(bytes)
    }
}

/// True when the payload contains an HTML document marker, which means a
/// feed endpoint answered with an error page instead of data.
pub fn looks_like_html(bytes: &[u8]) -> bool {
    const MARKER: &[u8] = b"<html";
    bytes
        .windows(MARKER.len())
        .any(|w| w.eq_ignore_ascii_case(MARKER))
}

/// Hex SHA-256 of a payload.
pub fn payload_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
