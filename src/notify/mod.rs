// src/notify/mod.rs
pub mod discord;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::outage::OutageCategory;

pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

/// Outage state of one identifier changed after a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub identifier: String,
    pub has_outage: bool,
    pub category: OutageCategory,
    /// `None` on the first result for this identifier.
    pub previous: Option<OutageCategory>,
    pub details: Vec<String>,
    pub ts: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn title(&self) -> String {
        if self.has_outage {
            format!("Outage at {}: {}", self.identifier, self.category.label())
        } else {
            format!("Outage cleared at {}", self.identifier)
        }
    }

    pub fn summary(&self) -> String {
        let was = self
            .previous
            .map(|c| c.label())
            .unwrap_or(OutageCategory::Unknown.label());
        format!("{} (was: {})", self.category.label(), was)
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one event out to every configured channel. Delivery failures are
/// logged, never propagated.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    /// Discord via `DISCORD_WEBHOOK_URL`, Slack via `SLACK_WEBHOOK_URL`.
    pub fn from_env() -> Self {
        let mut mux = Self::default();
        if let Some(url) = env_nonempty("DISCORD_WEBHOOK_URL") {
            mux = mux.with(DiscordNotifier::new(url));
        }
        if let Some(url) = env_nonempty("SLACK_WEBHOOK_URL") {
            mux = mux.with(SlackNotifier::new(url));
        }
        mux
    }

    pub fn with<N: Notifier + 'static>(mut self, n: N) -> Self {
        self.channels.push(Box::new(n));
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub async fn notify(&self, ev: &NotificationEvent) {
        tracing::info!(
            target: "notify",
            identifier = %ev.identifier,
            has_outage = ev.has_outage,
            category = ?ev.category,
            previous = ?ev.previous,
            "outage state changed"
        );
        for ch in &self.channels {
            if let Err(e) = ch.send(ev).await {
                tracing::warn!(target: "notify", channel = ch.name(), "notify failed: {e:#}");
            }
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
