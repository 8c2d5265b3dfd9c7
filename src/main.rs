//! Outage checker — binary entrypoint.
//! Loads config, starts one refresh loop per site, and serves the status API.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use outage_checker::api::{self, AppState};
use outage_checker::config;
use outage_checker::metrics::Metrics;
use outage_checker::outage::ErmWestSource;
use outage_checker::{NotifierMux, OutageRegistry};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
/// Filter from `RUST_LOG`, default `outage_checker=info,warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("outage_checker=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("ctrl-c handler: {e:#}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading outage config")?;
    if cfg.sites.is_empty() {
        bail!(
            "no sites configured: set {} or create {}",
            config::ENV_IDENTIFIER,
            config::DEFAULT_CONFIG_TOML
        );
    }

    let metrics = Metrics::install()?;
    let notifier = Arc::new(NotifierMux::from_env());
    tracing::info!(channels = notifier.channel_count(), "notifier ready");

    let source = Arc::new(ErmWestSource::new(&cfg.provider));
    tracing::info!(endpoint = source.endpoint(), "outage source configured");
    let registry = Arc::new(
        OutageRegistry::from_config(&cfg, source, Some(notifier))
            .context("starting site registry")?,
    );

    let app = api::router(AppState::new(Arc::clone(&registry))).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, sites = registry.len(), "outage checker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    registry.shutdown().await;
    Ok(())
}
