//! Time-bounded caching of rule snapshots.
//!
//! [`RuleCache`] is the only shared mutable state in the crate. It owns one
//! immutable [`RuleSnapshot`] reference and a rebuild lock:
//!
//! - a snapshot younger than the freshness window is served as-is, no store
//!   traffic;
//! - an expired or invalidated snapshot triggers a rebuild with exactly one
//!   store query, no matter how many requests observe the expiry at once
//!   (single-flight);
//! - a failed rebuild falls back to the previous snapshot for a bounded
//!   grace period, so a transient store outage does not flip every path to
//!   default-open or default-closed;
//! - the failure is surfaced only when there is no snapshot to fall back
//!   on, which the middleware reports as a service-level failure.
//!
//! [`invalidate`](RuleCache::invalidate) is called by the application layer
//! after any successful rule mutation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};

use crate::error::StoreError;
use crate::snapshot::RuleSnapshot;
use crate::store::RuleStore;

/// Default freshness window: 15 minutes.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(15 * 60);

/// Default grace period added on top of the freshness window during store
/// outages: 1 hour.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(60 * 60);

/// Default bound on a single store query.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// The cached snapshot plus the bookkeeping needed to judge it.
struct Slot {
    snapshot: Arc<RuleSnapshot>,
    fetched_at: Instant,
    generation: u64,
}

/// Caches the active rule set as an immutable snapshot with bounded
/// staleness.
///
/// Readers clone an `Arc` under a short read lock; replacing the slot is
/// the only write. Rebuilds run behind an async mutex so concurrent callers
/// never issue duplicate store queries.
///
/// # Example
/// ```no_run
/// use axum_pathgate::{MemoryRuleStore, NewRule, RuleCache, RuleStore, RuleUpdate, Visibility};
/// use std::sync::Arc;
///
/// # async fn demo() -> Result<(), axum_pathgate::StoreError> {
/// let store = Arc::new(MemoryRuleStore::with_rules(vec![
///     NewRule::new("/manage/").visibility(Visibility::PrivilegedOnly).priority(1),
/// ])?);
/// let cache = Arc::new(RuleCache::new(store.clone()));
///
/// let snapshot = cache.snapshot().await?;
/// assert_eq!(snapshot.len(), 1);
///
/// // After an administrator edits a rule:
/// store.update("/manage/", RuleUpdate::new().priority(5)).await?;
/// cache.invalidate();
/// # Ok(())
/// # }
/// ```
pub struct RuleCache {
    store: Arc<dyn RuleStore>,
    freshness: Duration,
    grace: Duration,
    store_timeout: Duration,
    slot: RwLock<Option<Slot>>,
    generation: AtomicU64,
    rebuild: Mutex<()>,
}

impl RuleCache {
    /// Create a cache over a rule store with the default freshness window,
    /// grace period, and store timeout.
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self {
            store,
            freshness: DEFAULT_FRESHNESS,
            grace: DEFAULT_GRACE,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            slot: RwLock::new(None),
            generation: AtomicU64::new(0),
            rebuild: Mutex::new(()),
        }
    }

    /// Set how long a snapshot is served without consulting the store.
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Set how long past the freshness window a stale snapshot may still be
    /// served while the store is unavailable.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Set the bound on a single store query.
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// The configured freshness window.
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// The configured grace period.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// The configured store-query bound.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Get the current snapshot, rebuilding it from the store if it is
    /// missing, older than the freshness window, or invalidated.
    ///
    /// Returns an error only when a rebuild fails and no previous snapshot
    /// is within the grace period.
    pub async fn snapshot(&self) -> Result<Arc<RuleSnapshot>, StoreError> {
        if let Some(snapshot) = self.current_if_fresh() {
            tracing::trace!(rules = snapshot.len(), "rule snapshot cache hit");
            return Ok(snapshot);
        }

        let _rebuild = self.rebuild.lock().await;
        // Another caller may have finished the rebuild while we waited.
        if let Some(snapshot) = self.current_if_fresh() {
            tracing::trace!(rules = snapshot.len(), "rule snapshot rebuilt by concurrent caller");
            return Ok(snapshot);
        }
        self.rebuild_locked().await
    }

    /// Discard the current snapshot: the next [`snapshot`](Self::snapshot)
    /// call rebuilds and is guaranteed to observe any store mutation
    /// sequenced before this call.
    ///
    /// Cheap and non-blocking; safe to call from an admin request
    /// concurrently with read-path evaluations.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("rule snapshot invalidated");
    }

    /// The snapshot currently held, regardless of freshness. `None` if no
    /// rebuild has ever succeeded.
    pub fn peek(&self) -> Option<Arc<RuleSnapshot>> {
        self.slot
            .read()
            .expect("snapshot slot lock poisoned")
            .as_ref()
            .map(|slot| slot.snapshot.clone())
    }

    fn current_if_fresh(&self) -> Option<Arc<RuleSnapshot>> {
        let slot = self.slot.read().expect("snapshot slot lock poisoned");
        let slot = slot.as_ref()?;
        if slot.generation != self.generation.load(Ordering::Acquire) {
            return None;
        }
        if slot.fetched_at.elapsed() >= self.freshness {
            return None;
        }
        Some(slot.snapshot.clone())
    }

    /// Rebuild while holding the rebuild lock.
    async fn rebuild_locked(&self) -> Result<Arc<RuleSnapshot>, StoreError> {
        // Record the generation before the query: if an invalidation lands
        // while the query is in flight, the slot we store must not count as
        // fresh afterwards.
        let generation = self.generation.load(Ordering::Acquire);
        let fetched_at = Instant::now();

        let rules = match timeout(self.store_timeout, self.store.list_active()).await {
            Ok(Ok(rules)) => rules,
            Ok(Err(err)) => return self.fall_back(err),
            Err(_) => {
                return self.fall_back(StoreError::Unavailable(format!(
                    "rule store query exceeded {:?}",
                    self.store_timeout
                )))
            }
        };

        let snapshot = Arc::new(RuleSnapshot::new(rules, Utc::now()));
        *self.slot.write().expect("snapshot slot lock poisoned") = Some(Slot {
            snapshot: snapshot.clone(),
            fetched_at,
            generation,
        });
        tracing::debug!(rules = snapshot.len(), "rule snapshot rebuilt");
        Ok(snapshot)
    }

    /// Serve the previous snapshot if it is within the grace period,
    /// otherwise propagate the store error.
    fn fall_back(&self, err: StoreError) -> Result<Arc<RuleSnapshot>, StoreError> {
        let slot = self.slot.read().expect("snapshot slot lock poisoned");
        match slot.as_ref() {
            Some(slot) => {
                let age = slot.fetched_at.elapsed();
                if age <= self.freshness + self.grace {
                    tracing::warn!(
                        error = %err,
                        age_secs = age.as_secs(),
                        "rule store unavailable, serving stale snapshot within grace period"
                    );
                    return Ok(slot.snapshot.clone());
                }
                tracing::error!(
                    error = %err,
                    age_secs = age.as_secs(),
                    "rule store unavailable and grace period exhausted"
                );
            }
            None => {
                tracing::error!(error = %err, "rule store unavailable with no snapshot to fall back on");
            }
        }
        Err(err)
    }
}

impl fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCache")
            .field("freshness", &self.freshness)
            .field("grace", &self.grace)
            .field("store_timeout", &self.store_timeout)
            .field("has_snapshot", &self.peek().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::rule::Visibility;
    use crate::snapshot::Decision;
    use crate::store::{MemoryRuleStore, NewRule, RuleUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Store wrapper with query counting, injectable failure, and a query
    /// delay for widening the single-flight window.
    struct FlakyStore {
        inner: MemoryRuleStore,
        queries: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
    }

    impl FlakyStore {
        fn new(rules: Vec<NewRule>) -> Self {
            Self {
                inner: MemoryRuleStore::with_rules(rules).unwrap(),
                queries: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RuleStore for FlakyStore {
        async fn list_active(&self) -> Result<Vec<crate::rule::AccessRule>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected outage".into()));
            }
            self.inner.list_active().await
        }

        async fn create(&self, rule: NewRule) -> Result<crate::rule::AccessRule, StoreError> {
            self.inner.create(rule).await
        }

        async fn update(
            &self,
            pattern: &str,
            change: RuleUpdate,
        ) -> Result<crate::rule::AccessRule, StoreError> {
            self.inner.update(pattern, change).await
        }
    }

    fn seeded() -> Vec<NewRule> {
        vec![NewRule::new("/manage/")
            .visibility(Visibility::PrivilegedOnly)
            .priority(1)]
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_served_within_freshness_window() {
        let store = Arc::new(FlakyStore::new(seeded()));
        let cache = RuleCache::new(store.clone());

        let first = cache.snapshot().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(store.queries(), 1);

        tokio::time::advance(DEFAULT_FRESHNESS - Duration::from_secs(1)).await;
        let second = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_rebuilds_after_expiry() {
        let store = Arc::new(FlakyStore::new(seeded()));
        let cache = RuleCache::new(store.clone());

        cache.snapshot().await.unwrap();
        tokio::time::advance(DEFAULT_FRESHNESS + Duration::from_secs(1)).await;
        cache.snapshot().await.unwrap();
        assert_eq!(store.queries(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_reflects_prior_mutation() {
        let store = Arc::new(FlakyStore::new(Vec::new()));
        let cache = RuleCache::new(store.clone());

        let before = cache.snapshot().await.unwrap();
        assert!(before.is_empty());

        store
            .create(NewRule::new("/secret/").visibility(Visibility::Hidden).priority(1))
            .await
            .unwrap();
        cache.invalidate();

        let after = cache.snapshot().await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after.evaluate("/secret/anything", true), Decision::NotFound);
        assert_eq!(store.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_rebuild() {
        let store = Arc::new(
            FlakyStore::new(seeded()).with_delay(Duration::from_millis(50)),
        );
        let cache = Arc::new(RuleCache::new(store.clone()));

        let snapshots = futures_util::future::join_all(
            (0..8).map(|_| {
                let cache = cache.clone();
                async move { cache.snapshot().await }
            }),
        )
        .await;

        assert_eq!(store.queries(), 1);
        let first = snapshots[0].as_ref().unwrap();
        for snapshot in &snapshots {
            assert!(Arc::ptr_eq(first, snapshot.as_ref().unwrap()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_serves_stale_within_grace() {
        let store = Arc::new(FlakyStore::new(seeded()));
        let cache = RuleCache::new(store.clone());

        let good = cache.snapshot().await.unwrap();
        store.set_failing(true);

        tokio::time::advance(DEFAULT_FRESHNESS + Duration::from_secs(1)).await;
        let stale = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&good, &stale));
        assert_eq!(store.queries(), 2);

        // Push the snapshot age past freshness + grace.
        tokio::time::advance(DEFAULT_GRACE).await;
        let err = cache.snapshot().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_cold_cache_failure_propagates_and_recovers() {
        let store = Arc::new(FlakyStore::new(seeded()));
        store.set_failing(true);
        let cache = RuleCache::new(store.clone());

        let err = cache.snapshot().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(cache.peek().is_none());

        store.set_failing(false);
        let snapshot = cache.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidated_snapshot_still_covers_an_outage() {
        let store = Arc::new(FlakyStore::new(seeded()));
        let cache = RuleCache::new(store.clone());

        let good = cache.snapshot().await.unwrap();
        store.set_failing(true);
        cache.invalidate();

        // The rebuild fails, but the previous rules keep governing rather
        // than flipping every path to default-open.
        let stale = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&good, &stale));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_query_timeout_counts_as_unavailable() {
        let store = Arc::new(
            FlakyStore::new(seeded()).with_delay(Duration::from_secs(30)),
        );
        let cache = RuleCache::new(store.clone()).with_store_timeout(Duration::from_secs(5));

        let err = cache.snapshot().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_write_errors_are_not_transient() {
        // Sanity-check the taxonomy the gate relies on: only outages ride
        // the grace path.
        let err = StoreError::DuplicatePattern("/x/".into());
        assert!(!err.is_transient());
        let err = StoreError::InvalidRule(RuleError::EmptyPattern);
        assert!(!err.is_transient());
    }
}
