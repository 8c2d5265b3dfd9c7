// src/registry.rs
//! Process-owned map of watched identifiers to their controllers and
//! recurring refresh tasks.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, SiteConfig};
use crate::notify::NotifierMux;
use crate::outage::{ClassifierPolicy, OutageQuery, OutageSource};
use crate::refresh::{spawn_refresh_loop, ControllerSnapshot, RefreshController};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("identifier {0} is already registered")]
    Duplicate(String),

    #[error("identifier {0} is not registered")]
    NotFound(String),

    #[error("invalid site config: {0}")]
    Invalid(String),
}

struct Entry {
    controller: Arc<RefreshController>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct OutageRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    source: Arc<dyn OutageSource>,
    policy: Arc<ClassifierPolicy>,
    notifier: Option<Arc<NotifierMux>>,
    refresh_timeout: Duration,
    network_timeout: Duration,
    shutdown: CancellationToken,
}

impl OutageRegistry {
    pub fn new(
        source: Arc<dyn OutageSource>,
        policy: ClassifierPolicy,
        refresh_timeout: Duration,
        network_timeout: Duration,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            source,
            policy: Arc::new(policy),
            notifier: None,
            refresh_timeout,
            network_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<NotifierMux>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build a registry from validated config and start every site.
    /// Must be called inside a tokio runtime.
    pub fn from_config(
        cfg: &AppConfig,
        source: Arc<dyn OutageSource>,
        notifier: Option<Arc<NotifierMux>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(
            source,
            cfg.policy.build(),
            Duration::from_secs(cfg.provider.refresh_timeout_secs),
            Duration::from_secs(cfg.provider.network_timeout_secs),
        );
        if let Some(n) = notifier {
            registry = registry.with_notifier(n);
        }
        for site in &cfg.sites {
            registry.register(site)?;
        }
        Ok(registry)
    }

    /// Add a site and start its refresh loop (first refresh runs at once).
    pub fn register(&self, site: &SiteConfig) -> Result<Arc<RefreshController>, RegistryError> {
        let identifier = site.identifier.trim().to_string();
        site.validate()
            .map_err(|e| RegistryError::Invalid(format!("{e:#}")))?;

        let mut entries = self.entries.write().expect("registry lock poisoned");
        if entries.contains_key(&identifier) {
            return Err(RegistryError::Duplicate(identifier));
        }

        let query = OutageQuery::new(identifier.clone())
            .with_timeouts(self.refresh_timeout, self.network_timeout);
        let mut controller = RefreshController::new(
            query,
            site.check_interval_minutes,
            Arc::clone(&self.source),
            Arc::clone(&self.policy),
        )
        .map_err(|e| RegistryError::Invalid(format!("{e:#}")))?;
        if let Some(n) = &self.notifier {
            controller = controller.with_notifier(Arc::clone(n));
        }
        let controller = Arc::new(controller);

        let cancel = self.shutdown.child_token();
        let task = spawn_refresh_loop(Arc::clone(&controller), cancel.clone());
        entries.insert(
            identifier.clone(),
            Entry {
                controller: Arc::clone(&controller),
                cancel,
                task,
            },
        );
        tracing::info!(
            identifier = %identifier,
            interval_minutes = site.check_interval_minutes,
            "site registered"
        );
        Ok(controller)
    }

    /// Stop a site's refresh loop and forget its cached result.
    pub async fn unregister(&self, identifier: &str) -> Result<(), RegistryError> {
        let identifier = identifier.trim();
        let entry = self
            .entries
            .write()
            .expect("registry lock poisoned")
            .remove(identifier)
            .ok_or_else(|| RegistryError::NotFound(identifier.to_string()))?;
        stop(identifier, entry).await;
        tracing::info!(identifier, "site unregistered");
        Ok(())
    }

    /// Stop-and-restart a site with a new interval. The cached result starts
    /// over with the new controller.
    pub async fn reconfigure(
        &self,
        identifier: &str,
        check_interval_minutes: u32,
    ) -> Result<Arc<RefreshController>, RegistryError> {
        let identifier = identifier.trim();
        let site = SiteConfig::new(identifier).with_interval_minutes(check_interval_minutes);
        site.validate()
            .map_err(|e| RegistryError::Invalid(format!("{e:#}")))?;
        self.unregister(identifier).await?;
        self.register(&site)
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<RefreshController>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(identifier.trim())
            .map(|e| Arc::clone(&e.controller))
    }

    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn snapshots(&self) -> Vec<ControllerSnapshot> {
        let mut out: Vec<ControllerSnapshot> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .map(|e| e.controller.snapshot())
            .collect();
        out.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every site.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let drained: Vec<(String, Entry)> = self
            .entries
            .write()
            .expect("registry lock poisoned")
            .drain()
            .collect();
        for (identifier, entry) in drained {
            stop(&identifier, entry).await;
        }
    }
}

async fn stop(identifier: &str, entry: Entry) {
    entry.cancel.cancel();
    if let Err(e) = entry.task.await {
        tracing::warn!(identifier, error = %e, "refresh loop ended abnormally");
    }
}
