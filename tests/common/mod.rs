// tests/common/mod.rs
// Shared test helpers: a scripted outage source with call counting.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use outage_checker::outage::{FetchError, OutageQuery, OutageSource};

pub const ID: &str = "300012345";

pub const UNPLANNED_HTML: &str = include_str!("../fixtures/erm_unplanned.html");
pub const NO_OUTAGE_HTML: &str = include_str!("../fixtures/erm_no_outage.html");
pub const BOTH_HTML: &str = include_str!("../fixtures/erm_both.html");
pub const UNMARKED_HTML: &str = include_str!("../fixtures/erm_unmarked.html");

/// Replays queued responses in order; repeats the last one when the queue
/// runs dry. Each fetch sleeps `delay` first.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<String, FetchError>>>,
    last: Mutex<Option<Result<String, FetchError>>>,
    delay: Duration,
    delays: Mutex<VecDeque<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<String, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            delay: Duration::ZERO,
            delays: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(html: &str) -> Self {
        Self::new(vec![Ok(html.to_string())])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Per-call delays consumed in order; `delay` applies once they run out.
    pub fn with_delays(self, delays: Vec<Duration>) -> Self {
        *self.delays.lock().unwrap() = delays.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl OutageSource for ScriptedSource {
    async fn fetch_page(&self, _query: &OutageQuery) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().pop_front().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(r) => {
                *last = Some(r.clone());
                r
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(FetchError::Communication("script exhausted".into()))),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Never answers.
pub struct HangingSource;

#[async_trait]
impl OutageSource for HangingSource {
    async fn fetch_page(&self, _query: &OutageQuery) -> Result<String, FetchError> {
        std::future::pending::<()>().await;
        unreachable!()
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}
