//! Rule snapshots and the matching algorithm.
//!
//! A [`RuleSnapshot`] is an immutable, time-stamped copy of the active rule
//! set, sorted once at build time. Matching is an ordered linear scan with
//! early exit: the first rule whose pattern prefixes the request path
//! governs it, which is why authors give specific patterns lower priority
//! numbers than general ones.

use chrono::{DateTime, Utc};

use crate::rule::{normalize_request_path, AccessRule, Visibility};

/// Outcome of evaluating a request path against a snapshot.
///
/// Denials are uniformly not-found rather than forbidden: a path whose
/// existence should not be revealed must be indistinguishable from one that
/// was never routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed to the inner handler.
    Allow,
    /// The path is reported as not-found for this identity.
    NotFound,
}

impl Decision {
    /// Check if the decision lets the request proceed.
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Check if the decision hides the path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// An immutable, sorted sequence of active rules tagged with the time it
/// was fetched from the store.
///
/// Snapshots are owned by the [`RuleCache`] and shared behind an `Arc`; the
/// matcher only borrows one for the duration of a single evaluation and
/// never mutates it.
///
/// # Example
/// ```
/// use axum_pathgate::{AccessRule, Decision, RuleSnapshot, Visibility};
/// use chrono::Utc;
///
/// let snapshot = RuleSnapshot::new(
///     vec![
///         AccessRule::new("/manage/", Visibility::PrivilegedOnly).with_priority(1),
///         AccessRule::new("/", Visibility::Public).with_priority(100),
///     ],
///     Utc::now(),
/// );
///
/// assert_eq!(snapshot.evaluate("/manage/clients/", false), Decision::NotFound);
/// assert_eq!(snapshot.evaluate("/manage/clients/", true), Decision::Allow);
/// assert_eq!(snapshot.evaluate("/about/", false), Decision::Allow);
/// ```
///
/// [`RuleCache`]: crate::cache::RuleCache
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    rules: Vec<AccessRule>,
    taken_at: DateTime<Utc>,
}

impl RuleSnapshot {
    /// Build a snapshot from store rows.
    ///
    /// Inactive rules are dropped and the remainder is sorted by
    /// `(priority asc, pattern asc)`. The ordering invariant is established
    /// here, once, rather than re-sorted per request.
    pub fn new(mut rules: Vec<AccessRule>, taken_at: DateTime<Utc>) -> Self {
        rules.retain(|rule| rule.active);
        rules.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        Self { rules, taken_at }
    }

    /// A snapshot with no rules: every path evaluates to allow.
    pub fn empty(taken_at: DateTime<Utc>) -> Self {
        Self {
            rules: Vec::new(),
            taken_at,
        }
    }

    /// The active rules in evaluation order.
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// When the rule set was fetched from the store.
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the snapshot holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the rule governing a request path: the first rule in stored
    /// order whose pattern equals or prefixes the normalized path.
    pub fn find_match(&self, path: &str) -> Option<&AccessRule> {
        let path = normalize_request_path(path);
        self.rules.iter().find(|rule| rule.matches(&path))
    }

    /// Evaluate a request path for an identity's privilege flag.
    ///
    /// Pure and deterministic: the same snapshot, path, and flag always
    /// produce the same decision.
    pub fn evaluate(&self, path: &str, privileged: bool) -> Decision {
        self.evaluate_with_match(path, privileged).0
    }

    /// Evaluate a request path and also report the governing rule.
    ///
    /// Returns `(decision, Some(rule))` when a rule matched, or
    /// `(Decision::Allow, None)` when none did (default-open). The gate
    /// uses the rule to tell the anonymous privileged-area case apart from
    /// a plain hide.
    pub fn evaluate_with_match(&self, path: &str, privileged: bool) -> (Decision, Option<&AccessRule>) {
        match self.find_match(path) {
            Some(rule) => {
                let decision = match rule.visibility {
                    Visibility::Public => Decision::Allow,
                    Visibility::Hidden => Decision::NotFound,
                    Visibility::PrivilegedOnly if privileged => Decision::Allow,
                    Visibility::PrivilegedOnly => Decision::NotFound,
                };
                tracing::debug!(
                    path,
                    pattern = %rule.pattern,
                    visibility = %rule.visibility,
                    priority = rule.priority,
                    privileged,
                    decision = ?decision,
                    "visibility rule matched"
                );
                (decision, Some(rule))
            }
            None => {
                tracing::trace!(path, privileged, "no visibility rule matched, allowing");
                (Decision::Allow, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, visibility: Visibility, priority: i32) -> AccessRule {
        AccessRule::new(pattern, visibility).with_priority(priority)
    }

    fn snapshot(rules: Vec<AccessRule>) -> RuleSnapshot {
        RuleSnapshot::new(rules, Utc::now())
    }

    #[test]
    fn test_default_open_when_nothing_matches() {
        let empty = RuleSnapshot::empty(Utc::now());
        assert_eq!(empty.evaluate("/anything/", false), Decision::Allow);

        let snap = snapshot(vec![rule("/manage/", Visibility::Hidden, 1)]);
        assert_eq!(snap.evaluate("/about/", false), Decision::Allow);
    }

    #[test]
    fn test_prefix_containment() {
        let snap = snapshot(vec![rule("/tips/", Visibility::Hidden, 1)]);
        assert_eq!(snap.evaluate("/tips/", true), Decision::NotFound);
        assert_eq!(snap.evaluate("/tips/3/", true), Decision::NotFound);
        assert_eq!(snap.evaluate("/tips/3/x", true), Decision::NotFound);
        assert_eq!(snap.evaluate("/tip/", true), Decision::Allow);
        assert_eq!(snap.evaluate("/tipsx/", true), Decision::Allow);
    }

    #[test]
    fn test_lower_priority_governs() {
        // Both patterns match /a/b/c; the priority-1 rule wins even though
        // it was inserted second.
        let snap = snapshot(vec![
            rule("/a/", Visibility::Public, 5),
            rule("/a/b/", Visibility::Hidden, 1),
        ]);
        let (decision, matched) = snap.evaluate_with_match("/a/b/c", true);
        assert_eq!(decision, Decision::NotFound);
        assert_eq!(matched.unwrap().pattern, "/a/b/");
    }

    #[test]
    fn test_priority_tie_breaks_on_pattern() {
        let snap = snapshot(vec![
            rule("/a/b/", Visibility::Hidden, 3),
            rule("/a/", Visibility::Public, 3),
        ]);
        // "/a/" sorts before "/a/b/", so the public rule governs.
        let (decision, matched) = snap.evaluate_with_match("/a/b/c", false);
        assert_eq!(decision, Decision::Allow);
        assert_eq!(matched.unwrap().pattern, "/a/");
    }

    #[test]
    fn test_hidden_wins_over_privilege() {
        let snap = snapshot(vec![rule("/secret/", Visibility::Hidden, 1)]);
        assert_eq!(snap.evaluate("/secret/anything", true), Decision::NotFound);
        assert_eq!(snap.evaluate("/secret/anything", false), Decision::NotFound);
    }

    #[test]
    fn test_privileged_only_matrix() {
        let snap = snapshot(vec![rule("/manage/", Visibility::PrivilegedOnly, 1)]);
        assert_eq!(snap.evaluate("/manage/inquiries/", true), Decision::Allow);
        assert_eq!(snap.evaluate("/manage/inquiries/", false), Decision::NotFound);
    }

    #[test]
    fn test_inactive_rules_never_match() {
        let snap = snapshot(vec![
            rule("/drafts/", Visibility::Hidden, 1).disabled(),
        ]);
        assert!(snap.is_empty());
        assert_eq!(snap.evaluate("/drafts/x", false), Decision::Allow);
    }

    #[test]
    fn test_ordering_established_at_build() {
        let snap = snapshot(vec![
            rule("/c/", Visibility::Public, 10),
            rule("/b/", Visibility::Public, 2),
            rule("/a/", Visibility::Public, 2),
        ]);
        let patterns: Vec<&str> = snap.rules().iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/a/", "/b/", "/c/"]);
    }

    #[test]
    fn test_root_rule_overrides_default() {
        let snap = snapshot(vec![rule("/", Visibility::PrivilegedOnly, 100)]);
        assert_eq!(snap.evaluate("/anywhere/", false), Decision::NotFound);
        assert_eq!(snap.evaluate("/anywhere/", true), Decision::Allow);
    }

    #[test]
    fn test_unrooted_path_is_normalized() {
        let snap = snapshot(vec![rule("/tips/", Visibility::Hidden, 1)]);
        assert_eq!(snap.evaluate("tips/3/", false), Decision::NotFound);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let snap = snapshot(vec![
            rule("/manage/", Visibility::PrivilegedOnly, 1),
            rule("/secret/", Visibility::Hidden, 2),
        ]);
        for _ in 0..3 {
            assert_eq!(snap.evaluate("/manage/x", false), Decision::NotFound);
            assert_eq!(snap.evaluate("/secret/x", true), Decision::NotFound);
            assert_eq!(snap.evaluate("/open/", false), Decision::Allow);
        }
    }
}
