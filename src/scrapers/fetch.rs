//! Shared HTTP fetching for all adapters.
//!
//! One `reqwest::Client` is built at startup and cloned into every adapter so
//! connection pools are shared. Each request carries the configured deadline;
//! a hung origin fails its own source instead of stalling it forever.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use super::AdapterError;

/// Thin wrapper over a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with a per-request `timeout` and `user_agent`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` and decode the body using the response's declared charset
    /// (UTF-8 when none is declared).
    pub async fn fetch(&self, url: &str) -> Result<String, AdapterError> {
        self.get(url, None).await
    }

    /// Fetch `url`, decoding with `charset` unless the response declares one.
    pub async fn fetch_with_charset(
        &self,
        url: &str,
        charset: &str,
    ) -> Result<String, AdapterError> {
        self.get(url, Some(charset)).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str, charset: Option<&str>) -> Result<String, AdapterError> {
        let transport = |source| AdapterError::Transport {
            url: url.to_string(),
            source,
        };

        let res = self.client.get(url).send().await.map_err(transport)?;
        let status = res.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = match charset {
            Some(charset) => res.text_with_charset(charset).await,
            None => res.text().await,
        }
        .map_err(transport)?;

        debug!(bytes = body.len(), %status, "Fetched page");
        Ok(body)
    }
}
