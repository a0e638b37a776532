//! Client configuration resolved from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8082/api/contracts";
pub const DEFAULT_CACHE_DIR: &str = "data/kg-cache";
pub const REVIEW_STREAM_PATH: &str = "/ws/review";

/// Endpoints and local paths used by the review client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the contract-service REST API (no trailing slash).
    pub service_url: String,
    /// Base URL of the review event stream; a contract id is appended.
    pub stream_url: String,
    /// Directory backing the knowledge-graph cache.
    pub cache_dir: PathBuf,
    /// Bearer token to seed the auth session with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Timeout applied to every REST request.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.into(),
            stream_url: derive_stream_url(DEFAULT_SERVICE_URL)
                .unwrap_or_else(|| format!("ws://localhost:8082{}", REVIEW_STREAM_PATH)),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            token: None,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let service_url = lookup("CRA_SERVICE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.into())
            .trim_end_matches('/')
            .to_string();

        let stream_url = match lookup("CRA_WS_URL").filter(|s| !s.trim().is_empty()) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => derive_stream_url(&service_url).ok_or_else(|| {
                Error::Config(format!(
                    "cannot derive stream URL from service URL {}",
                    service_url
                ))
            })?,
        };

        let cache_dir = lookup("CRA_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

        let request_timeout_secs = match lookup("CRA_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("CRA_REQUEST_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            None => 30,
        };

        let config = Self {
            service_url,
            stream_url,
            cache_dir,
            token: lookup("CRA_TOKEN").filter(|t| !t.is_empty()),
            request_timeout_secs,
        };
        debug!(
            "Client config: service={}, stream={}, cache={}",
            config.service_url,
            config.stream_url,
            config.cache_dir.display()
        );
        Ok(config)
    }

    /// Stream URL scoped to one contract.
    pub fn stream_url_for(&self, contract_id: &str) -> String {
        format!("{}/{}", self.stream_url, contract_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Map an `http(s)://host[:port]/...` service URL onto the review stream origin.
pub fn derive_stream_url(service_url: &str) -> Option<String> {
    let (scheme, rest) = if let Some(rest) = service_url.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = service_url.strip_prefix("http://") {
        ("ws", rest)
    } else {
        return None;
    };
    let host = rest.split('/').next().filter(|h| !h.is_empty())?;
    Some(format!("{}://{}{}", scheme, host, REVIEW_STREAM_PATH))
}
