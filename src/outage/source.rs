// src/outage/source.rs
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::ProviderSettings;
use crate::outage::error::FetchError;
use crate::outage::types::OutageQuery;

/// Where outage pages come from.
#[async_trait]
pub trait OutageSource: Send + Sync {
    /// Fetch the raw outage page for `query.identifier`, honoring
    /// `query.network_timeout`.
    async fn fetch_page(&self, query: &OutageQuery) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

/// Live ERM West lookup over HTTP.
#[derive(Debug, Clone)]
pub struct ErmWestSource {
    endpoint: String,
    search_trigger: String,
    user_agent: String,
}

impl ErmWestSource {
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            search_trigger: settings.search_trigger.clone(),
            user_agent: settings.user_agent.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// A client per attempt: nothing is kept alive between cycles.
    fn client(&self, query: &OutageQuery) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(query.network_timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| FetchError::Communication(format!("building http client: {e}")))
    }
}

#[async_trait]
impl OutageSource for ErmWestSource {
    async fn fetch_page(&self, query: &OutageQuery) -> Result<String, FetchError> {
        let client = self.client(query)?;
        let resp = client
            .get(&self.endpoint)
            .query(&[
                ("submit", self.search_trigger.as_str()),
                ("key", query.identifier.as_str()),
            ])
            .send()
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    target: "outage",
                    identifier = %query.identifier,
                    error = %e,
                    "outage page request failed"
                );
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        resp.text().await.map_err(FetchError::from)
    }

    fn name(&self) -> &'static str {
        "erm-west"
    }
}

/// Serves a fixed page. Used by tests and for offline runs against a saved
/// page sample.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    html: String,
}

impl FixtureSource {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

#[async_trait]
impl OutageSource for FixtureSource {
    async fn fetch_page(&self, _query: &OutageQuery) -> Result<String, FetchError> {
        Ok(self.html.clone())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
