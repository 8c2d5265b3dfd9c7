// src/outage/mod.rs
pub mod classify;
pub mod error;
pub mod source;
pub mod types;

use std::sync::Arc;

use chrono::Utc;

pub use crate::outage::classify::{ClassifierPolicy, DetailFilter, UnmarkedDefault};
pub use crate::outage::error::FetchError;
pub use crate::outage::source::{ErmWestSource, FixtureSource, OutageSource};
pub use crate::outage::types::{OutageCategory, OutageQuery, OutageResult};

/// Fetch the outage page for `query` and classify it.
///
/// The page is parsed on a blocking worker so many identifiers can wait on
/// the network concurrently without HTML parsing stalling the runtime.
pub async fn fetch_and_classify(
    source: &dyn OutageSource,
    policy: &Arc<ClassifierPolicy>,
    query: &OutageQuery,
) -> Result<OutageResult, FetchError> {
    let html = source.fetch_page(query).await?;
    let fetched_at = Utc::now();

    let policy = Arc::clone(policy);
    let identifier = query.identifier.clone();
    tokio::task::spawn_blocking(move || policy.classify(&html, &identifier, fetched_at)).await?
}
