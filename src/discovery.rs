//! Route discovery and store seeding.
//!
//! Maps the routes an application serves onto candidate rules, so every
//! page starts out with an explicit entry administrators can retune
//! instead of an invisible default. Parameterized route paths collapse to
//! their static ancestor: `/tips/{id}/comments/` seeds `/tips/`.
//!
//! Seeding never overwrites what an administrator configured. Existing
//! patterns are skipped, or at most have their description refreshed when
//! [`SeedMode::RefreshDescriptions`] asks for it.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::store::{NewRule, RuleStore, RuleUpdate};

/// Priority assigned to discovered rules, late enough that any
/// administrator-authored rule with a lower number wins.
pub const DISCOVERED_RULE_PRIORITY: i32 = 100;

/// A rule candidate derived from a served route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCandidate {
    /// The rule pattern the route maps onto.
    pub pattern: String,
    /// Human-readable description derived from the path.
    pub description: String,
}

/// Derive deduplicated rule candidates from route paths.
///
/// Paths with capture segments (`{id}`, `{*rest}`, or the older `:id`
/// form) collapse to their static ancestor with a trailing slash. Fully
/// static paths gain a trailing slash unless the last segment names a
/// file. Duplicate patterns are dropped, keeping the first candidate.
///
/// # Example
/// ```
/// use axum_pathgate::candidates_from_routes;
///
/// let candidates = candidates_from_routes(["/tips/", "/tips/{id}/", "/about"]);
/// let patterns: Vec<&str> = candidates.iter().map(|c| c.pattern.as_str()).collect();
/// assert_eq!(patterns, vec!["/tips/", "/about/"]);
/// assert_eq!(candidates[1].description, "About Page");
/// ```
pub fn candidates_from_routes<I, S>(routes: I) -> Vec<RouteCandidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut candidates: Vec<RouteCandidate> = Vec::new();
    for route in routes {
        if let Some(candidate) = shape_route(route.as_ref()) {
            if !candidates.iter().any(|c| c.pattern == candidate.pattern) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// Shape one route path into a pattern and description.
fn shape_route(route: &str) -> Option<RouteCandidate> {
    let route = route.trim();
    if route.is_empty() {
        return None;
    }

    let mut statics: Vec<&str> = Vec::new();
    let mut collapsed = false;
    for segment in route.split('/').filter(|s| !s.is_empty()) {
        if is_capture(segment) {
            collapsed = true;
            break;
        }
        statics.push(segment);
    }

    let pattern = if statics.is_empty() {
        "/".to_string()
    } else {
        let joined = statics.join("/");
        let file_like = !collapsed && statics.last().map_or(false, |s| s.contains('.'));
        if file_like {
            format!("/{joined}")
        } else {
            format!("/{joined}/")
        }
    };

    let description = if statics.is_empty() {
        "Root Page".to_string()
    } else {
        let words: Vec<String> = statics.iter().map(|s| title_case(s)).collect();
        format!("{} Page", words.join(" "))
    };

    Some(RouteCandidate {
        pattern,
        description,
    })
}

fn is_capture(segment: &str) -> bool {
    segment.starts_with('{') || segment.starts_with(':') || segment.starts_with('*')
}

/// Title-case a path segment, treating `-` and `_` as word breaks.
fn title_case(segment: &str) -> String {
    segment
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// How [`seed_store`] treats patterns that already exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeedMode {
    /// Leave existing rules exactly as the administrator configured them.
    #[default]
    SkipExisting,
    /// Additionally rewrite the description of existing active rules whose
    /// stored description differs from the candidate's. Visibility,
    /// priority, and the active flag are never touched.
    RefreshDescriptions,
}

/// Outcome of a [`seed_store`] run, by pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Patterns created by this run.
    pub created: Vec<String>,
    /// Patterns whose description was refreshed.
    pub updated: Vec<String>,
    /// Patterns left untouched.
    pub skipped: Vec<String>,
}

/// Write candidates into a store as public, active rules at
/// [`DISCOVERED_RULE_PRIORITY`].
///
/// Existing patterns are never overwritten; [`SeedMode::RefreshDescriptions`]
/// makes the one exception for descriptions. Inactive rules are invisible
/// to [`RuleStore::list_active`], so their descriptions cannot be compared
/// and they are always skipped.
///
/// Seeding does not invalidate any cache. Callers seeding a live store
/// follow up with [`RuleCache::invalidate`].
///
/// [`RuleCache::invalidate`]: crate::cache::RuleCache::invalidate
pub async fn seed_store(
    store: &dyn RuleStore,
    candidates: &[RouteCandidate],
    mode: SeedMode,
) -> Result<SeedReport, StoreError> {
    let existing: HashMap<String, String> = match mode {
        SeedMode::SkipExisting => HashMap::new(),
        SeedMode::RefreshDescriptions => store
            .list_active()
            .await?
            .into_iter()
            .map(|rule| (rule.pattern, rule.description))
            .collect(),
    };

    let mut report = SeedReport::default();
    for candidate in candidates {
        let new_rule = NewRule::new(candidate.pattern.clone())
            .priority(DISCOVERED_RULE_PRIORITY)
            .description(candidate.description.clone());
        match store.create(new_rule).await {
            Ok(rule) => {
                tracing::debug!(pattern = %rule.pattern, "seeded discovered rule");
                report.created.push(rule.pattern);
            }
            Err(StoreError::DuplicatePattern(pattern)) => {
                let differs = existing
                    .get(&pattern)
                    .map_or(false, |stored| stored != &candidate.description);
                if mode == SeedMode::RefreshDescriptions && differs {
                    store
                        .update(
                            &pattern,
                            RuleUpdate::new().description(candidate.description.clone()),
                        )
                        .await?;
                    tracing::debug!(pattern = %pattern, "refreshed discovered rule description");
                    report.updated.push(pattern);
                } else {
                    report.skipped.push(pattern);
                }
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(
        created = report.created.len(),
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        "store seeding finished"
    );
    Ok(report)
}
