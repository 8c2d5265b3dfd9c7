// src/config/mod.rs
//! Service configuration: watched sites, provider endpoint, classifier policy.
//!
//! Resolution order used by [`load_default`]:
//! 1) `$OUTAGE_CONFIG_PATH` (must exist)
//! 2) `config/outage.toml`
//! 3) `config/outage.json`
//! 4) a single site from `$OUTAGE_IDENTIFIER` (+ `$OUTAGE_CHECK_INTERVAL_MINUTES`)

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::outage::{ClassifierPolicy, DetailFilter, UnmarkedDefault};
use crate::outage::classify::{
    DEFAULT_NO_OUTAGE_PHRASES, DEFAULT_PLANNED_MARKER, DEFAULT_UNPLANNED_MARKER,
};

pub const ENV_CONFIG_PATH: &str = "OUTAGE_CONFIG_PATH";
pub const ENV_IDENTIFIER: &str = "OUTAGE_IDENTIFIER";
pub const ENV_CHECK_INTERVAL: &str = "OUTAGE_CHECK_INTERVAL_MINUTES";

pub const DEFAULT_CONFIG_TOML: &str = "config/outage.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/outage.json";

pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 60;
pub const MIN_CHECK_INTERVAL_MINUTES: u32 = 1;
pub const MAX_CHECK_INTERVAL_MINUTES: u32 = 1440;

pub const ERM_WEST_URL: &str = "https://info.ermzapad.bg/webint/vok/avplan.php";
pub const DEFAULT_SEARCH_TRIGGER: &str = "Търсене";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

fn default_check_interval() -> u32 {
    DEFAULT_CHECK_INTERVAL_MINUTES
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub policy: PolicySettings,
}

/// One watched identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub identifier: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u32,
}

impl SiteConfig {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
        }
    }

    pub fn with_interval_minutes(mut self, minutes: u32) -> Self {
        self.check_interval_minutes = minutes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            bail!("site identifier must not be empty");
        }
        validate_interval(self.check_interval_minutes)
            .with_context(|| format!("site {}", self.identifier))
    }
}

pub fn validate_interval(minutes: u32) -> Result<()> {
    if !(MIN_CHECK_INTERVAL_MINUTES..=MAX_CHECK_INTERVAL_MINUTES).contains(&minutes) {
        bail!(
            "check_interval_minutes must be within {MIN_CHECK_INTERVAL_MINUTES}..={MAX_CHECK_INTERVAL_MINUTES}, got {minutes}"
        );
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub search_trigger: String,
    pub user_agent: String,
    pub network_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: ERM_WEST_URL.to_string(),
            search_trigger: DEFAULT_SEARCH_TRIGGER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            network_timeout_secs: 20,
            refresh_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub unmarked_default: UnmarkedDefault,
    pub detail_filter: DetailFilter,
    pub no_outage_phrases: Vec<String>,
    pub planned_marker: String,
    pub unplanned_marker: String,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            unmarked_default: UnmarkedDefault::default(),
            detail_filter: DetailFilter::default(),
            no_outage_phrases: DEFAULT_NO_OUTAGE_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            planned_marker: DEFAULT_PLANNED_MARKER.to_string(),
            unplanned_marker: DEFAULT_UNPLANNED_MARKER.to_string(),
        }
    }
}

impl PolicySettings {
    pub fn build(&self) -> ClassifierPolicy {
        ClassifierPolicy::new(
            &self.no_outage_phrases,
            &self.planned_marker,
            &self.unplanned_marker,
        )
        .with_unmarked_default(self.unmarked_default)
        .with_detail_filter(self.detail_filter)
    }
}

impl AppConfig {
    pub fn single(site: SiteConfig) -> Self {
        Self {
            sites: vec![site],
            ..Self::default()
        }
    }

    /// Trim identifiers and check ranges, uniqueness and timeout nesting.
    pub fn validate(mut self) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for site in &mut self.sites {
            site.identifier = site.identifier.trim().to_string();
            site.validate()?;
            if !seen.insert(site.identifier.clone()) {
                bail!("duplicate site identifier {}", site.identifier);
            }
        }

        let p = &self.provider;
        if p.endpoint.trim().is_empty() {
            bail!("provider endpoint must not be empty");
        }
        if p.network_timeout_secs == 0 || p.refresh_timeout_secs == 0 {
            bail!("provider timeouts must be positive");
        }
        if p.network_timeout_secs >= p.refresh_timeout_secs {
            bail!(
                "network_timeout_secs ({}) must be below refresh_timeout_secs ({})",
                p.network_timeout_secs,
                p.refresh_timeout_secs
            );
        }
        if self.policy.planned_marker.trim().is_empty()
            || self.policy.unplanned_marker.trim().is_empty()
        {
            bail!("policy markers must not be empty");
        }
        Ok(self)
    }
}

/// Load and validate config from an explicit path. Supports TOML or JSON.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading outage config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing outage config {}", path.display()))?;
    cfg.validate()
}

/// Load config using env var + fallbacks (see module docs).
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        return load_from(&pb);
    }
    for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    from_env()
}

fn from_env() -> Result<AppConfig> {
    let Ok(identifier) = std::env::var(ENV_IDENTIFIER) else {
        return Ok(AppConfig::default());
    };
    let mut site = SiteConfig::new(identifier);
    if let Ok(raw) = std::env::var(ENV_CHECK_INTERVAL) {
        site.check_interval_minutes = raw
            .trim()
            .parse()
            .with_context(|| format!("{ENV_CHECK_INTERVAL} is not an integer: {raw}"))?;
    }
    AppConfig::single(site).validate()
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        _ => serde_json::from_str::<AppConfig>(s)
            .or_else(|_| toml::from_str::<AppConfig>(s))
            .map_err(|_| anyhow!("unsupported outage config format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_with_defaults_fills_provider_and_policy() {
        let cfg = parse_config(
            r#"
[[sites]]
identifier = " 300012345 "
"#,
            "toml",
        )
        .unwrap()
        .validate()
        .unwrap();
        assert_eq!(cfg.sites, vec![SiteConfig::new("300012345")]);
        assert_eq!(cfg.provider, ProviderSettings::default());
        assert_eq!(cfg.policy.detail_filter, DetailFilter::MinLength);
        assert_eq!(cfg.policy.unmarked_default, UnmarkedDefault::AssumeOutage);
    }

    #[test]
    fn policy_variants_parse_from_snake_case() {
        let cfg: AppConfig = toml::from_str(
            r#"
[policy]
unmarked_default = "assume_none"
detail_filter = "contains_identifier"
"#,
        )
        .unwrap();
        assert_eq!(cfg.policy.unmarked_default, UnmarkedDefault::AssumeNone);
        assert_eq!(cfg.policy.detail_filter, DetailFilter::ContainsIdentifier);
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        assert!(validate_interval(0).is_err());
        assert!(validate_interval(1).is_ok());
        assert!(validate_interval(1440).is_ok());
        assert!(validate_interval(1441).is_err());
    }

    #[test]
    fn duplicate_and_empty_identifiers_are_rejected() {
        let dup = AppConfig {
            sites: vec![SiteConfig::new("A1"), SiteConfig::new(" A1")],
            ..AppConfig::default()
        };
        assert!(dup.validate().is_err());

        assert!(AppConfig::single(SiteConfig::new("   ")).validate().is_err());
    }

    #[test]
    fn network_timeout_must_nest_inside_refresh_timeout() {
        let mut cfg = AppConfig::single(SiteConfig::new("A1"));
        cfg.provider.network_timeout_secs = 30;
        assert!(cfg.validate().is_err());
    }
}
