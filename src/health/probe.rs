//! Client for the external health probe service
//!
//! The service answers `GET {base}/health?proxy=ip:port` with
//! `{"success": bool, "proxy": "ip:port", "latency_ms": number}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::error::{Result, VigilError};
use crate::models::round_latency;

/// Raw answer from the probe service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProbeResponse {
    pub success: bool,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub latency_ms: f64,
}

impl ProbeResponse {
    /// Whole milliseconds, never negative
    pub fn latency_millis(&self) -> u64 {
        round_latency(self.latency_ms)
    }
}

/// Something that can check one `ip:port` endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Any error here is a failed probe for `address`
    async fn probe(&self, address: &str) -> Result<ProbeResponse>;
}

/// [`HealthProbe`] backed by the remote probe service over HTTP
#[derive(Clone)]
pub struct HttpHealthProbe {
    client: Client,
    endpoint: Url,
}

impl HttpHealthProbe {
    pub fn new(config: &HealthCheckConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.probe_timeout).build()?;

        Ok(Self {
            client,
            endpoint: health_endpoint(&config.api_base_url)?,
        })
    }

    fn request_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("proxy", address);
        url
    }
}

/// `{base}/health`, keeping any path prefix on the base URL
fn health_endpoint(base: &Url) -> Result<Url> {
    let mut endpoint = base.clone();
    endpoint
        .path_segments_mut()
        .map_err(|_| VigilError::InvalidConfig(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .push("health");
    endpoint.set_query(None);
    Ok(endpoint)
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, address: &str) -> Result<ProbeResponse> {
        let url = self.request_url(address);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| probe_failure(address, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(probe_failure(address, format!("HTTP error {}", status)));
        }

        let body: ProbeResponse = response
            .json()
            .await
            .map_err(|e| probe_failure(address, format!("invalid response body: {}", e)))?;

        debug!(
            address = address,
            success = body.success,
            latency_ms = body.latency_ms,
            "Probe answered"
        );

        Ok(body)
    }
}

fn probe_failure(address: &str, reason: String) -> VigilError {
    VigilError::ProbeFailure {
        address: address.to_string(),
        reason,
    }
}
