// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod change_detector;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod outage;
pub mod refresh;
pub mod registry;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::notify::{NotificationEvent, Notifier, NotifierMux};
pub use crate::outage::{
    fetch_and_classify, ClassifierPolicy, FetchError, OutageCategory, OutageQuery, OutageResult,
};
pub use crate::refresh::RefreshController;
pub use crate::registry::OutageRegistry;
