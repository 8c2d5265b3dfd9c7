// src/refresh/mod.rs
//! Per-identifier refresh controller: outer timeout, single-flight
//! coalescing, and the "last known good + failure flag" cache.

pub mod scheduler;

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::sync::Mutex;

use crate::change_detector::detect_change;
use crate::config::validate_interval;
use crate::notify::{NotificationEvent, NotifierMux};
use crate::outage::{
    fetch_and_classify, ClassifierPolicy, FetchError, OutageQuery, OutageResult, OutageSource,
};

pub use scheduler::spawn_refresh_loop;

#[derive(Debug, Default)]
struct ControllerState {
    /// Completed attempts; lets a waiting caller see that the attempt it
    /// queued behind has finished.
    attempts: u64,
    result: Option<OutageResult>,
    last_update_success: bool,
    last_error: Option<FetchError>,
    last_outcome: Option<Result<OutageResult, FetchError>>,
    last_attempt_at: Option<DateTime<Utc>>,
}

/// Read-only view of a controller for consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub identifier: String,
    pub interval: Duration,
    /// Last known good result; survives failed attempts.
    pub result: Option<OutageResult>,
    pub last_update_success: bool,
    pub last_error: Option<FetchError>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_refresh_at: Option<DateTime<Utc>>,
}

pub struct RefreshController {
    query: OutageQuery,
    interval: Duration,
    source: Arc<dyn OutageSource>,
    policy: Arc<ClassifierPolicy>,
    notifier: Option<Arc<NotifierMux>>,
    flight: Mutex<()>,
    state: RwLock<ControllerState>,
}

impl fmt::Debug for RefreshController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshController")
            .field("identifier", &self.query.identifier)
            .field("interval", &self.interval)
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}

impl RefreshController {
    /// `check_interval_minutes` must be within 1..=1440. It is fixed for the
    /// lifetime of the controller.
    pub fn new(
        query: OutageQuery,
        check_interval_minutes: u32,
        source: Arc<dyn OutageSource>,
        policy: Arc<ClassifierPolicy>,
    ) -> Result<Self> {
        validate_interval(check_interval_minutes)?;
        Ok(Self {
            query,
            interval: Duration::from_secs(u64::from(check_interval_minutes) * 60),
            source,
            policy,
            notifier: None,
            flight: Mutex::new(()),
            state: RwLock::new(ControllerState::default()),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<NotifierMux>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.query.identifier
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_result(&self) -> Option<OutageResult> {
        self.read_state().result.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.read_state().last_update_success
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let st = self.read_state();
        let next_refresh_at = st.last_attempt_at.and_then(|at| {
            chrono::Duration::from_std(self.interval)
                .ok()
                .map(|d| at + d)
        });
        ControllerSnapshot {
            identifier: self.query.identifier.clone(),
            interval: self.interval,
            result: st.result.clone(),
            last_update_success: st.last_update_success,
            last_error: st.last_error.clone(),
            last_attempt_at: st.last_attempt_at,
            next_refresh_at,
        }
    }

    /// Refresh now and return the fresh classification.
    ///
    /// At most one attempt per controller runs at a time. A caller that
    /// arrives while an attempt is in flight waits for it and gets its
    /// outcome instead of starting another fetch.
    pub async fn refresh(&self) -> Result<OutageResult, FetchError> {
        let seen = self.read_state().attempts;
        let flight = self.flight.lock().await;

        if let Some(shared) = self.outcome_since(seen) {
            counter!("outage_refresh_coalesced_total").increment(1);
            tracing::debug!(
                target: "refresh",
                identifier = %self.query.identifier,
                "joined in-flight refresh"
            );
            return shared;
        }

        let outcome = self.attempt().await;
        let event = self.record(&outcome);
        drop(flight);

        if let (Some(ev), Some(mux)) = (event, self.notifier.as_ref()) {
            mux.notify(&ev).await;
        }
        outcome
    }

    async fn attempt(&self) -> Result<OutageResult, FetchError> {
        counter!("outage_refresh_total").increment(1);
        let work = fetch_and_classify(self.source.as_ref(), &self.policy, &self.query);
        match tokio::time::timeout(self.query.refresh_timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Publish the outcome of one attempt. A failure keeps the cached result.
    fn record(&self, outcome: &Result<OutageResult, FetchError>) -> Option<NotificationEvent> {
        let now = Utc::now();
        let mut st = self.state.write().expect("refresh state poisoned");
        st.attempts += 1;
        st.last_attempt_at = Some(now);
        st.last_outcome = Some(outcome.clone());

        match outcome {
            Ok(fresh) => {
                let prev = st.result.replace(fresh.clone());
                st.last_update_success = true;
                st.last_error = None;
                gauge!("outage_last_success_ts").set(now.timestamp() as f64);
                tracing::info!(
                    target: "refresh",
                    identifier = %fresh.identifier,
                    source = self.source.name(),
                    has_outage = fresh.has_outage,
                    category = ?fresh.category,
                    details = fresh.details.len(),
                    "refresh ok"
                );
                detect_change(prev.as_ref(), fresh)
            }
            Err(e) => {
                st.last_update_success = false;
                st.last_error = Some(e.clone());
                counter!("outage_refresh_failures_total", "kind" => e.kind()).increment(1);
                tracing::warn!(
                    target: "refresh",
                    identifier = %self.query.identifier,
                    source = self.source.name(),
                    error = %e,
                    "refresh failed, keeping last known result"
                );
                None
            }
        }
    }

    fn outcome_since(&self, seen: u64) -> Option<Result<OutageResult, FetchError>> {
        let st = self.read_state();
        if st.attempts == seen {
            return None;
        }
        st.last_outcome.clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ControllerState> {
        self.state.read().expect("refresh state poisoned")
    }
}
