//! Rule store contract and the in-memory reference implementation.
//!
//! The store is the durable home of [`AccessRule`]s, edited by
//! administrators and read by the [`RuleCache`] in bulk. Implement
//! [`RuleStore`] to back rules with a database; [`MemoryRuleStore`] covers
//! tests, demos, and config-seeded deployments.
//!
//! Mutations do not invalidate the cache themselves. The application layer
//! that performs a create or update is responsible for calling
//! [`RuleCache::invalidate`] afterwards.
//!
//! [`RuleCache`]: crate::cache::RuleCache
//! [`RuleCache::invalidate`]: crate::cache::RuleCache::invalidate

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::rule::{normalize_pattern, AccessRule, Visibility};

/// Fields for creating a rule.
///
/// Defaults mirror a freshly discovered path: public, active, priority 0,
/// empty description. Timestamps are set by the store, never supplied here.
///
/// # Example
/// ```
/// use axum_pathgate::{NewRule, Visibility};
///
/// let rule = NewRule::new("/manage/")
///     .visibility(Visibility::PrivilegedOnly)
///     .priority(1)
///     .description("Management area");
/// ```
#[derive(Debug, Clone)]
pub struct NewRule {
    /// Path prefix; validated and trimmed by the store at create time.
    pub pattern: String,
    /// Visibility class. Defaults to public.
    pub visibility: Visibility,
    /// Whether the rule participates in matching. Defaults to true.
    pub active: bool,
    /// Evaluation order; lower first. Defaults to 0.
    pub priority: i32,
    /// Free text for administrators.
    pub description: String,
}

impl NewRule {
    /// Create a public, active rule for a pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            visibility: Visibility::Public,
            active: true,
            priority: 0,
            description: String::new(),
        }
    }

    /// Set the visibility class.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the evaluation priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set whether the rule starts active.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Partial update applied to an existing rule.
///
/// Unset fields are left untouched. The pattern itself is immutable; it is
/// the rule's identity. Soft enable/disable travels through
/// [`RuleUpdate::active`] — rules are never deleted through this interface.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    /// New visibility class, if changing.
    pub visibility: Option<Visibility>,
    /// New active flag, if changing.
    pub active: Option<bool>,
    /// New priority, if changing.
    pub priority: Option<i32>,
    /// New description, if changing.
    pub description: Option<String>,
}

impl RuleUpdate {
    /// Create an update that changes nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the visibility class.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Change the active flag.
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Change the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Change the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Trait for durable rule storage.
///
/// Implement this to load rules from a database or remote service. Backends
/// map their transport failures into [`StoreError::Unavailable`] so the
/// cache can apply its grace-period fallback.
///
/// # Example
/// ```
/// use axum_pathgate::{AccessRule, NewRule, RuleStore, RuleUpdate, StoreError};
/// use async_trait::async_trait;
///
/// struct DbRuleStore { /* connection pool */ }
///
/// #[async_trait]
/// impl RuleStore for DbRuleStore {
///     async fn list_active(&self) -> Result<Vec<AccessRule>, StoreError> {
///         // SELECT ... WHERE active ORDER BY priority, pattern
///         # Ok(Vec::new())
///     }
///
///     async fn create(&self, rule: NewRule) -> Result<AccessRule, StoreError> {
///         # let _ = rule;
///         # Err(StoreError::Unavailable("demo".into()))
///     }
///
///     async fn update(&self, pattern: &str, change: RuleUpdate) -> Result<AccessRule, StoreError> {
///         # let _ = (pattern, change);
///         # Err(StoreError::Unavailable("demo".into()))
///     }
/// }
/// ```
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Fetch every rule with `active = true`, sorted by
    /// `(priority asc, pattern asc)`.
    async fn list_active(&self) -> Result<Vec<AccessRule>, StoreError>;

    /// Create a rule. Validates the pattern, rejects duplicates, and sets
    /// both timestamps.
    async fn create(&self, rule: NewRule) -> Result<AccessRule, StoreError>;

    /// Apply a partial update to the rule with the given pattern, bumping
    /// `updated_at`. Fails with [`StoreError::UnknownPattern`] when no such
    /// rule exists.
    async fn update(&self, pattern: &str, change: RuleUpdate) -> Result<AccessRule, StoreError>;
}

/// In-memory rule store keyed by pattern.
///
/// The reference [`RuleStore`] implementation: pattern uniqueness, write-time
/// validation, and store-set timestamps, all behind an `RwLock`. Suitable
/// for tests, demos, and deployments whose rule set is seeded from
/// configuration at startup.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: RwLock<BTreeMap<String, AccessRule>>,
}

impl MemoryRuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with rules, validating each like
    /// [`RuleStore::create`] would.
    ///
    /// # Example
    /// ```
    /// use axum_pathgate::{MemoryRuleStore, NewRule, Visibility};
    ///
    /// let store = MemoryRuleStore::with_rules(vec![
    ///     NewRule::new("/manage/").visibility(Visibility::PrivilegedOnly).priority(1),
    ///     NewRule::new("/drafts/").visibility(Visibility::Hidden).priority(2),
    /// ]).unwrap();
    /// assert_eq!(store.len(), 2);
    /// ```
    pub fn with_rules(rules: Vec<NewRule>) -> Result<Self, StoreError> {
        let store = Self::new();
        {
            let mut map = store.rules.write().expect("rule store lock poisoned");
            for new in rules {
                let rule = build_rule(new)?;
                if map.contains_key(&rule.pattern) {
                    return Err(StoreError::DuplicatePattern(rule.pattern));
                }
                map.insert(rule.pattern.clone(), rule);
            }
        }
        Ok(store)
    }

    /// Total number of rules, active and inactive.
    pub fn len(&self) -> usize {
        self.rules.read().expect("rule store lock poisoned").len()
    }

    /// Check if the store holds no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate a [`NewRule`] and stamp it into an [`AccessRule`].
fn build_rule(new: NewRule) -> Result<AccessRule, StoreError> {
    let pattern = normalize_pattern(&new.pattern)?;
    let now = Utc::now();
    Ok(AccessRule {
        pattern,
        visibility: new.visibility,
        active: new.active,
        priority: new.priority,
        description: new.description,
        created_at: now,
        updated_at: now,
    })
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_active(&self) -> Result<Vec<AccessRule>, StoreError> {
        let map = self.rules.read().expect("rule store lock poisoned");
        let mut active: Vec<AccessRule> = map.values().filter(|r| r.active).cloned().collect();
        active.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        tracing::trace!(count = active.len(), "listed active rules");
        Ok(active)
    }

    async fn create(&self, rule: NewRule) -> Result<AccessRule, StoreError> {
        let rule = build_rule(rule)?;
        let mut map = self.rules.write().expect("rule store lock poisoned");
        if map.contains_key(&rule.pattern) {
            return Err(StoreError::DuplicatePattern(rule.pattern));
        }
        tracing::debug!(
            pattern = %rule.pattern,
            visibility = %rule.visibility,
            priority = rule.priority,
            "rule created"
        );
        map.insert(rule.pattern.clone(), rule.clone());
        Ok(rule)
    }

    async fn update(&self, pattern: &str, change: RuleUpdate) -> Result<AccessRule, StoreError> {
        let pattern = normalize_pattern(pattern)?;
        let mut map = self.rules.write().expect("rule store lock poisoned");
        let rule = map
            .get_mut(&pattern)
            .ok_or_else(|| StoreError::UnknownPattern(pattern.clone()))?;
        if let Some(visibility) = change.visibility {
            rule.visibility = visibility;
        }
        if let Some(active) = change.active {
            rule.active = active;
        }
        if let Some(priority) = change.priority {
            rule.priority = priority;
        }
        if let Some(description) = change.description {
            rule.description = description;
        }
        rule.updated_at = Utc::now();
        tracing::debug!(
            pattern = %rule.pattern,
            visibility = %rule.visibility,
            active = rule.active,
            "rule updated"
        );
        Ok(rule.clone())
    }
}
