use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the outage series.
    /// Only one recorder may be installed per process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("outage_refresh_total", "Refresh attempts that hit the provider.");
    describe_counter!(
        "outage_refresh_failures_total",
        "Failed refresh attempts, by error kind."
    );
    describe_counter!(
        "outage_refresh_coalesced_total",
        "Refresh calls answered by an attempt already in flight."
    );
    describe_histogram!("outage_classify_ms", "Outage page classification time in milliseconds.");
    describe_gauge!(
        "outage_last_success_ts",
        "Unix ts of the last successful refresh."
    );
}
