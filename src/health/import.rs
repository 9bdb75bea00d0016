//! Bulk import of proxy lists
//!
//! A list is plain text, one `ip,port,country,org` record per line.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::ImportConfig;
use crate::error::{Result, VigilError};
use crate::models::ProxyRecord;

/// Country code used when a line carries none
pub const UNKNOWN_COUNTRY: &str = "XX";

/// Where import lists come from
#[async_trait]
pub trait ImportSource: Send + Sync {
    /// Raw list text at `url`
    async fn fetch_list(&self, url: &str) -> Result<String>;
}

/// Fetches lists over HTTP(S)
#[derive(Clone)]
pub struct HttpImportSource {
    client: Client,
}

impl HttpImportSource {
    pub fn new(config: &ImportConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.fetch_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImportSource for HttpImportSource {
    async fn fetch_list(&self, url: &str) -> Result<String> {
        let url = url::Url::parse(url.trim())
            .map_err(|e| VigilError::InvalidRequest(format!("Invalid import URL: {}", e)))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| VigilError::ImportFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VigilError::ImportFetch(format!(
                "Failed to fetch {}: {}",
                url, status
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| VigilError::ImportFetch(e.to_string()))?;

        debug!(url = %url, bytes = text.len(), "Fetched proxy list");
        Ok(text)
    }
}

/// Parse a proxy list, silently dropping lines without an ip or port
pub fn parse_proxy_list(text: &str) -> Vec<ProxyRecord> {
    text.split('\n').filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<ProxyRecord> {
    let mut fields = line.split(',').map(str::trim);

    let ip = fields.next().filter(|s| !s.is_empty())?;
    let port = fields.next().filter(|s| !s.is_empty())?;
    let country = fields
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_COUNTRY);
    let org = fields.next().filter(|s| !s.is_empty());

    Some(ProxyRecord::new(
        ip,
        port,
        Some(country.to_string()),
        org.map(str::to_string),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Serves a fixed body, or fails every fetch
    pub struct StaticSource {
        body: Option<String>,
    }

    impl StaticSource {
        pub fn ok(body: &str) -> Self {
            Self {
                body: Some(body.to_string()),
            }
        }

        pub fn failing() -> Self {
            Self { body: None }
        }
    }

    #[async_trait]
    impl ImportSource for StaticSource {
        async fn fetch_list(&self, url: &str) -> Result<String> {
            self.body
                .clone()
                .ok_or_else(|| VigilError::ImportFetch(format!("Failed to fetch {}: 404", url)))
        }
    }
}
