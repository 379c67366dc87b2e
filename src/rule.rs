//! Access rule definitions and matching logic.
//!
//! This module provides the core [`AccessRule`] struct: a path-prefix pattern
//! paired with a visibility class.
//!
//! - **Pattern**: a normalized path prefix, rooted at `/`, unique per rule
//! - **Visibility**: [`Public`](Visibility::Public),
//!   [`PrivilegedOnly`](Visibility::PrivilegedOnly), or
//!   [`Hidden`](Visibility::Hidden)
//! - **Priority**: lower values are evaluated first; ties break on pattern
//!   text so results are reproducible
//!
//! Matching is exact-prefix, not regex: a rule on `/tips/` governs `/tips/`
//! and `/tips/3/`, but not `/tipsx/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::RuleError;

/// Visibility class of a path governed by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Anyone may view the path.
    #[default]
    Public,
    /// Only privileged identities may view the path. Everyone else is told
    /// it does not exist; anonymous callers are offered a login instead.
    PrivilegedOnly,
    /// The path is reported as not-found for every identity, privileged
    /// included.
    Hidden,
}

impl Visibility {
    /// String form used in configuration files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::PrivilegedOnly => "privileged_only",
            Self::Hidden => "hidden",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored statement that a path prefix has a given visibility.
///
/// Rules are authored by administrators through a [`RuleStore`] and evaluated
/// against request paths in `(priority, pattern)` order. Inactive rules are
/// kept for history but never participate in matching.
///
/// [`RuleStore`]: crate::store::RuleStore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// Normalized path prefix, rooted at `/`. Unique among rules.
    pub pattern: String,
    /// Visibility class applied when this rule governs a path.
    pub visibility: Visibility,
    /// Inactive rules are excluded from matching but retained for history.
    pub active: bool,
    /// Evaluation order: lower values first. More specific patterns should
    /// be given lower priorities by whoever authors the rules; the engine
    /// does not infer specificity.
    pub priority: i32,
    /// Free text for administrators. Not semantically load-bearing.
    pub description: String,
    /// Set by the store when the rule is created.
    pub created_at: DateTime<Utc>,
    /// Set by the store on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl AccessRule {
    /// Create an active rule with priority 0 and timestamps of now.
    ///
    /// The pattern is taken as-is. Store-backed creation goes through
    /// [`RuleStore::create`](crate::store::RuleStore::create), which
    /// validates patterns first; this constructor is for static rule sets
    /// and tests.
    pub fn new(pattern: impl Into<String>, visibility: Visibility) -> Self {
        let now = Utc::now();
        Self {
            pattern: pattern.into(),
            visibility,
            active: true,
            priority: 0,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the evaluation priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the rule inactive.
    pub fn disabled(mut self) -> Self {
        self.active = false;
        self
    }

    /// Check if a normalized request path is governed by this rule.
    ///
    /// Exact equality counts as a match; so does any path the pattern is a
    /// prefix of. The root pattern `/` therefore matches every path.
    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.pattern)
    }
}

/// Validate and normalize a rule pattern at write time.
///
/// Normalization is trimming only; comparisons at evaluation time are
/// exact-prefix, so the stored text must already be the literal prefix.
/// Empty patterns and patterns not rooted at `/` are rejected.
///
/// # Example
/// ```
/// use axum_pathgate::normalize_pattern;
///
/// assert_eq!(normalize_pattern(" /tips/ ").unwrap(), "/tips/");
/// assert!(normalize_pattern("tips/").is_err());
/// assert!(normalize_pattern("   ").is_err());
/// ```
pub fn normalize_pattern(raw: &str) -> Result<String, RuleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RuleError::EmptyPattern);
    }
    if !trimmed.starts_with('/') {
        return Err(RuleError::UnrootedPattern(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Normalize a request path for matching: ensure a leading `/` and nothing
/// else, so comparisons against stored patterns stay exact-prefix.
pub fn normalize_request_path(path: &str) -> Cow<'_, str> {
    if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        let rule = AccessRule::new("/tips/", Visibility::Public);
        assert!(rule.matches("/tips/"));
        assert!(rule.matches("/tips/3/"));
        assert!(rule.matches("/tips/3/x"));
        assert!(!rule.matches("/tip/"));
        assert!(!rule.matches("/tipsx/"));
    }

    #[test]
    fn test_root_pattern_matches_every_path() {
        let rule = AccessRule::new("/", Visibility::Hidden);
        assert!(rule.matches("/"));
        assert!(rule.matches("/anything"));
        assert!(rule.matches("/a/b/c/"));
    }

    #[test]
    fn test_normalize_pattern_trims() {
        assert_eq!(normalize_pattern("  /manage/  ").unwrap(), "/manage/");
        assert_eq!(normalize_pattern("/").unwrap(), "/");
    }

    #[test]
    fn test_normalize_pattern_rejects_empty() {
        assert_eq!(normalize_pattern(""), Err(RuleError::EmptyPattern));
        assert_eq!(normalize_pattern("   "), Err(RuleError::EmptyPattern));
    }

    #[test]
    fn test_normalize_pattern_rejects_unrooted() {
        assert_eq!(
            normalize_pattern("manage/"),
            Err(RuleError::UnrootedPattern("manage/".to_string()))
        );
    }

    #[test]
    fn test_normalize_request_path() {
        assert_eq!(normalize_request_path("/tips/"), "/tips/");
        assert_eq!(normalize_request_path("tips/"), "/tips/");
        assert_eq!(normalize_request_path(""), "/");
    }

    #[test]
    fn test_visibility_config_names() {
        #[derive(Deserialize)]
        struct Doc {
            v: Visibility,
        }
        let doc: Doc = toml::from_str(r#"v = "privileged_only""#).unwrap();
        assert_eq!(doc.v, Visibility::PrivilegedOnly);
        let doc: Doc = toml::from_str(r#"v = "hidden""#).unwrap();
        assert_eq!(doc.v, Visibility::Hidden);
        assert!(toml::from_str::<Doc>(r#"v = "staff_only""#).is_err());
    }
}
