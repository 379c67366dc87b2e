//! # axum-pathgate
//!
//! Path-visibility middleware for [axum](https://docs.rs/axum) 0.8.
//!
//! Request paths are checked against an ordered list of [`AccessRule`]s
//! before any handler runs. Each rule names a path prefix and a visibility
//! class:
//!
//! - **Public**: served to everyone.
//! - **PrivilegedOnly**: served to privileged callers. Authenticated but
//!   unprivileged callers get a 404; anonymous callers are redirected to
//!   the login page with the requested path preserved for post-login
//!   return.
//! - **Hidden**: 404 for everyone, privileged callers included.
//!
//! Paths matching no rule are served normally, so the gate can be layered
//! onto an existing site and tightened one prefix at a time. Denials
//! answer 404 rather than 403: a restricted path is indistinguishable from
//! an absent one.
//!
//! Rules live in a [`RuleStore`] and are evaluated from an in-process
//! [`RuleCache`] snapshot, so the per-request cost is a linear scan over a
//! handful of prefixes, with one store query per freshness window.
//!
//! ## Quick Start
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use axum_pathgate::{MemoryRuleStore, NewRule, PathGateLayer, RuleCache, Visibility};
//! use std::sync::Arc;
//!
//! async fn home() -> &'static str {
//!     "Welcome"
//! }
//!
//! async fn pending_inquiries() -> &'static str {
//!     "For privileged eyes"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(
//!         MemoryRuleStore::with_rules(vec![
//!             NewRule::new("/manage/")
//!                 .visibility(Visibility::PrivilegedOnly)
//!                 .priority(1)
//!                 .description("Management area"),
//!             NewRule::new("/drafts/")
//!                 .visibility(Visibility::Hidden)
//!                 .priority(1),
//!         ])
//!         .unwrap(),
//!     );
//!     let cache = Arc::new(RuleCache::new(store));
//!
//!     let app = Router::new()
//!         .route("/", get(home))
//!         .route("/manage/inquiries/pending/", get(pending_inquiries))
//!         .layer(PathGateLayer::new(cache));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Rule Evaluation
//!
//! 1. **Bypass check**: paths on the [`BypassList`] (by default the admin
//!    tool, static assets, media, and the liveness check) skip evaluation
//!    entirely and never touch the rule store.
//! 2. **Prefix scan**: active rules are scanned in `(priority asc, pattern
//!    asc)` order; the first rule whose pattern is a prefix of the request
//!    path governs. A rule for `/tips/` covers `/tips/`, `/tips/3/`, and
//!    everything deeper, but not `/tipsx/`.
//! 3. **Visibility**: the governing rule's class plus the caller's
//!    [`Identity`] decide between passing the request through, a 404, or a
//!    login redirect.
//!
//! If the rule store is unreachable and no snapshot is left to serve, the
//! gate answers 503 rather than guessing in either direction.
//!
//! ## Identity Extraction
//!
//! The gate never validates credentials. The host application establishes
//! who the caller is, and an [`IdentityExtractor`] reads that result from
//! each request. The default reads a trusted-proxy header:
//!
//! ```no_run
//! use axum_pathgate::{HeaderIdentityExtractor, MemoryRuleStore, PathGateLayer, RuleCache};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(RuleCache::new(Arc::new(MemoryRuleStore::new())));
//! let layer = PathGateLayer::new(cache)
//!     .with_identity_extractor(HeaderIdentityExtractor::new("x-auth-class"));
//! ```
//!
//! Applications that resolve sessions in their own middleware use an
//! [`ExtensionIdentityExtractor`] over the session type instead, and tests
//! pin an identity with [`FixedIdentityExtractor`].
//!
//! ## Editing Rules at Runtime
//!
//! Store mutations do not touch the cache; whoever performs the mutation
//! invalidates afterwards, and the next request sees the change:
//!
//! ```
//! use axum_pathgate::{MemoryRuleStore, NewRule, RuleCache, RuleStore, Visibility};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), axum_pathgate::StoreError> {
//! let store = Arc::new(MemoryRuleStore::new());
//! let cache = Arc::new(RuleCache::new(store.clone()));
//!
//! store
//!     .create(NewRule::new("/drafts/").visibility(Visibility::Hidden).priority(1))
//!     .await?;
//! cache.invalidate();
//!
//! assert!(cache.snapshot().await?.evaluate("/drafts/post/", true).is_not_found());
//! # Ok(())
//! # }
//! ```
//!
//! ## Seeding and Configuration
//!
//! [`RulesConfig`] loads gate settings and seed rules from TOML, and
//! [`candidates_from_routes`] plus [`seed_store`] turn the routes an
//! application serves into editable rule entries without overwriting what
//! an administrator already configured. The `route_scan` binary
//! (`cargo run --bin route_scan -- src`) prints those candidates as
//! ready-to-paste `[[rules]]` TOML.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

mod cache;
mod config;
mod discovery;
mod error;
mod identity;
mod middleware;
mod rule;
mod snapshot;
mod store;

// Re-export main types
pub use cache::{RuleCache, DEFAULT_FRESHNESS, DEFAULT_GRACE, DEFAULT_STORE_TIMEOUT};
pub use config::{ConfigError, ConfigSettings, RuleConfig, RulesConfig};
pub use discovery::{
    candidates_from_routes, seed_store, RouteCandidate, SeedMode, SeedReport,
    DISCOVERED_RULE_PRIORITY,
};
pub use error::{RuleError, StoreError};
pub use identity::{
    ExtensionIdentityExtractor, FixedIdentityExtractor, HeaderIdentityExtractor, Identity,
    IdentityExtractor, DEFAULT_IDENTITY_HEADER,
};
pub use middleware::{
    BypassList, GateConfig, PathGateLayer, PathGateMiddleware, DEFAULT_LOGIN_PATH,
    DEFAULT_NEXT_PARAM,
};
pub use rule::{normalize_pattern, normalize_request_path, AccessRule, Visibility};
pub use snapshot::{Decision, RuleSnapshot};
pub use store::{MemoryRuleStore, NewRule, RuleStore, RuleUpdate};

/// Prelude module for convenient imports.
///
/// ```
/// use axum_pathgate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::RuleCache;
    pub use crate::config::{ConfigError, RulesConfig};
    pub use crate::discovery::{candidates_from_routes, seed_store, SeedMode, SeedReport};
    pub use crate::error::{RuleError, StoreError};
    pub use crate::identity::{
        FixedIdentityExtractor, HeaderIdentityExtractor, Identity, IdentityExtractor,
    };
    pub use crate::middleware::{BypassList, PathGateLayer};
    pub use crate::rule::{AccessRule, Visibility};
    pub use crate::snapshot::{Decision, RuleSnapshot};
    pub use crate::store::{MemoryRuleStore, NewRule, RuleStore, RuleUpdate};
}
