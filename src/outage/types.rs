// src/outage/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(20);

/// Immutable input of a single refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutageQuery {
    pub identifier: String,
    /// Outer budget around fetch + parse.
    pub refresh_timeout: Duration,
    /// Network-level budget, nested inside `refresh_timeout`.
    pub network_timeout: Duration,
}

impl OutageQuery {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, refresh: Duration, network: Duration) -> Self {
        self.refresh_timeout = refresh;
        self.network_timeout = network;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageCategory {
    None,
    Planned,
    Unplanned,
    Both,
    Unknown,
}

impl OutageCategory {
    /// Label shown to end users, in the provider's language.
    pub fn label(self) -> &'static str {
        match self {
            OutageCategory::None => "Няма текуща авария",
            OutageCategory::Planned => "Планирана авария",
            OutageCategory::Unplanned => "Непланирана авария",
            OutageCategory::Both => "Планирана и непланирана авария",
            OutageCategory::Unknown => "Unknown",
        }
    }

    pub fn from_markers(planned: bool, unplanned: bool) -> Option<Self> {
        match (planned, unplanned) {
            (true, true) => Some(OutageCategory::Both),
            (true, false) => Some(OutageCategory::Planned),
            (false, true) => Some(OutageCategory::Unplanned),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageResult {
    pub identifier: String,
    pub fetched_at: DateTime<Utc>,
    pub has_outage: bool,
    pub category: OutageCategory,
    pub details: Vec<String>,
    /// Version tag of the classifier policy that produced this result.
    pub policy: String,
}

impl OutageResult {
    pub fn no_outage(identifier: &str, policy: &str, fetched_at: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.to_string(),
            fetched_at,
            has_outage: false,
            category: OutageCategory::None,
            details: Vec::new(),
            policy: policy.to_string(),
        }
    }

    pub fn outage(
        identifier: &str,
        policy: &str,
        fetched_at: DateTime<Utc>,
        category: OutageCategory,
        details: Vec<String>,
    ) -> Self {
        debug_assert!(category != OutageCategory::None);
        Self {
            identifier: identifier.to_string(),
            fetched_at,
            has_outage: true,
            category,
            details,
            policy: policy.to_string(),
        }
    }

    /// `has_outage == false` iff `category == None`.
    pub fn is_consistent(&self) -> bool {
        self.has_outage == (self.category != OutageCategory::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_map_to_categories() {
        assert_eq!(
            OutageCategory::from_markers(true, true),
            Some(OutageCategory::Both)
        );
        assert_eq!(
            OutageCategory::from_markers(true, false),
            Some(OutageCategory::Planned)
        );
        assert_eq!(
            OutageCategory::from_markers(false, true),
            Some(OutageCategory::Unplanned)
        );
        assert_eq!(OutageCategory::from_markers(false, false), None);
    }

    #[test]
    fn constructors_keep_flag_and_category_in_sync() {
        let now = Utc::now();
        assert!(OutageResult::no_outage("42", "p", now).is_consistent());
        let r = OutageResult::outage("42", "p", now, OutageCategory::Planned, vec![]);
        assert!(r.is_consistent());
        assert!(r.has_outage);
    }

    #[test]
    fn category_serializes_snake_case() {
        let s = serde_json::to_string(&OutageCategory::Unplanned).unwrap();
        assert_eq!(s, "\"unplanned\"");
    }
}
