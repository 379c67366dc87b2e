//! TOML configuration for gate settings and seed rules.
//!
//! This module provides structures for loading the gate's settings and an
//! initial rule set from TOML, either compiled in at build time or read
//! from a file at startup.
//!
//! # Example TOML Format
//!
//! ```toml
//! [settings]
//! freshness_secs = 900
//! grace_secs = 3600
//! store_timeout_secs = 5
//! login_path = "/accounts/login/"
//! next_param = "next"
//! bypass_prefixes = ["/admin/", "/static/", "/media/"]
//! bypass_exact = ["/health/"]
//!
//! [[rules]]
//! pattern = "/manage/"
//! visibility = "privileged_only"
//! priority = 1
//! description = "Management area"
//!
//! [[rules]]
//! pattern = "/drafts/"
//! visibility = "hidden"
//! priority = 1
//! ```
//!
//! Every key has a default; an empty file is a valid configuration with no
//! seed rules. Rule patterns are validated exactly like store writes, so a
//! pattern that loads here will also seed cleanly.
//!
//! # Usage
//!
//! ```ignore
//! use axum_pathgate::RulesConfig;
//!
//! // Embed at compile time
//! const GATE_CONFIG: &str = include_str!("../pathgate.toml");
//!
//! let config = RulesConfig::from_toml(GATE_CONFIG)?;
//! let store = MemoryRuleStore::with_rules(config.seed_rules())?;
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_FRESHNESS, DEFAULT_GRACE, DEFAULT_STORE_TIMEOUT};
use crate::middleware::{BypassList, DEFAULT_LOGIN_PATH, DEFAULT_NEXT_PARAM};
use crate::rule::{normalize_pattern, Visibility};
use crate::store::NewRule;

/// Configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Gate settings.
    #[serde(default)]
    pub settings: ConfigSettings,
    /// Seed rules loaded into the store at startup.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// The `[settings]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSettings {
    /// Seconds a snapshot is served without consulting the store.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,

    /// Seconds past the freshness window a stale snapshot may still be
    /// served while the store is unavailable.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Bound on a single store query, in seconds.
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// Authentication entry point anonymous callers are redirected to.
    /// Must be rooted at `/`; may carry a query string.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Query parameter carrying the requested path through the login flow.
    #[serde(default = "default_next_param")]
    pub next_param: String,

    /// Path prefixes exempt from rule evaluation.
    #[serde(default = "default_bypass_prefixes")]
    pub bypass_prefixes: Vec<String>,

    /// Exact paths exempt from rule evaluation.
    #[serde(default = "default_bypass_exact")]
    pub bypass_exact: Vec<String>,
}

fn default_freshness_secs() -> u64 {
    DEFAULT_FRESHNESS.as_secs()
}

fn default_grace_secs() -> u64 {
    DEFAULT_GRACE.as_secs()
}

fn default_store_timeout_secs() -> u64 {
    DEFAULT_STORE_TIMEOUT.as_secs()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_next_param() -> String {
    DEFAULT_NEXT_PARAM.to_string()
}

fn default_bypass_prefixes() -> Vec<String> {
    BypassList::default().prefixes().to_vec()
}

fn default_bypass_exact() -> Vec<String> {
    BypassList::default().exact_paths().to_vec()
}

impl Default for ConfigSettings {
    fn default() -> Self {
        Self {
            freshness_secs: default_freshness_secs(),
            grace_secs: default_grace_secs(),
            store_timeout_secs: default_store_timeout_secs(),
            login_path: default_login_path(),
            next_param: default_next_param(),
            bypass_prefixes: default_bypass_prefixes(),
            bypass_exact: default_bypass_exact(),
        }
    }
}

/// A single `[[rules]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Path prefix the rule governs. Validated like a store write.
    pub pattern: String,

    /// Visibility class: `"public"`, `"privileged_only"`, or `"hidden"`.
    #[serde(default)]
    pub visibility: Visibility,

    /// Whether the rule participates in matching.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Evaluation order; lower numbers are checked first.
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Free text for administrators.
    #[serde(default)]
    pub description: String,
}

fn default_active() -> bool {
    true
}

fn default_priority() -> i32 {
    100
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// File I/O error.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl RulesConfig {
    /// Parse a configuration from a TOML string.
    ///
    /// # Example
    /// ```
    /// use axum_pathgate::RulesConfig;
    ///
    /// let toml = r#"
    /// [settings]
    /// freshness_secs = 300
    ///
    /// [[rules]]
    /// pattern = "/manage/"
    /// visibility = "privileged_only"
    /// priority = 1
    /// "#;
    ///
    /// let config = RulesConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.rules.len(), 1);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: RulesConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Example
    /// ```ignore
    /// use axum_pathgate::RulesConfig;
    ///
    /// let config = RulesConfig::from_file("pathgate.toml").unwrap();
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.settings.login_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "login_path '{}' must be rooted at '/'",
                self.settings.login_path
            )));
        }
        if self.settings.next_param.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "next_param must not be empty".to_string(),
            ));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            normalize_pattern(&rule.pattern)
                .map_err(|err| ConfigError::Invalid(format!("rule {}: {}", i, err)))?;
        }
        Ok(())
    }

    /// How long a snapshot is served without consulting the store.
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.settings.freshness_secs)
    }

    /// How long past the freshness window a stale snapshot may still be
    /// served while the store is unavailable.
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.settings.grace_secs)
    }

    /// Bound on a single store query.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.store_timeout_secs)
    }

    /// Build the bypass list from the configured prefixes and exact paths.
    pub fn bypass_list(&self) -> BypassList {
        let mut bypass = BypassList::none();
        for prefix in &self.settings.bypass_prefixes {
            bypass = bypass.prefix(prefix.clone());
        }
        for path in &self.settings.bypass_exact {
            bypass = bypass.exact(path.clone());
        }
        bypass
    }

    /// The `[[rules]]` entries as store writes.
    ///
    /// Suitable for [`MemoryRuleStore::with_rules`] or a create loop over
    /// any other store.
    ///
    /// [`MemoryRuleStore::with_rules`]: crate::store::MemoryRuleStore::with_rules
    pub fn seed_rules(&self) -> Vec<NewRule> {
        self.rules
            .iter()
            .map(|rule| {
                NewRule::new(rule.pattern.clone())
                    .visibility(rule.visibility)
                    .active(rule.active)
                    .priority(rule.priority)
                    .description(rule.description.clone())
            })
            .collect()
    }
}
