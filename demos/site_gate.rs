//! Demo site with a privileged management area and a hidden drafts
//! section, gated by path-visibility rules.
//!
//! Run with: `cargo run --example site_gate`
//!
//! Test with:
//! ```sh
//! # Public pages (anyone)
//! curl -i http://localhost:3000/
//! curl -i http://localhost:3000/tips/
//!
//! # Management area, anonymous: 302 to the login page with ?next=
//! curl -i http://localhost:3000/manage/inquiries/pending/
//!
//! # Management area, authenticated but not privileged: 404
//! curl -i -H "x-pathgate-identity: member" http://localhost:3000/manage/inquiries/pending/
//!
//! # Management area, privileged: 200
//! curl -i -H "x-pathgate-identity: privileged" http://localhost:3000/manage/inquiries/pending/
//!
//! # Hidden drafts: 404 for everyone, even privileged callers
//! curl -i -H "x-pathgate-identity: privileged" http://localhost:3000/drafts/rewrite/
//!
//! # Liveness check bypasses the rules entirely
//! curl -i http://localhost:3000/health/
//! ```

use axum::{routing::get, Router};
use axum_pathgate::{MemoryRuleStore, NewRule, PathGateLayer, RuleCache, Visibility};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Handler functions
async fn home() -> &'static str {
    "Welcome to the site"
}

async fn tips() -> &'static str {
    "Tips index - public"
}

async fn pending_inquiries() -> &'static str {
    "Pending inquiries - privileged only"
}

async fn draft_rewrite() -> &'static str {
    "Unpublished draft - hidden from everyone"
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "axum_pathgate=debug,site_gate=debug".into()),
        )
        .init();

    // Seed the rule store: a public site with one privileged area and one
    // hidden section
    let store = Arc::new(
        MemoryRuleStore::with_rules(vec![
            NewRule::new("/manage/")
                .visibility(Visibility::PrivilegedOnly)
                .priority(1)
                .description("Management area"),
            NewRule::new("/drafts/")
                .visibility(Visibility::Hidden)
                .priority(1)
                .description("Unpublished drafts"),
            NewRule::new("/tips/")
                .priority(100)
                .description("Tips Page"),
        ])
        .unwrap(),
    );
    let cache = Arc::new(RuleCache::new(store));
    tracing::info!("Rule store seeded with 3 rules");

    // Build the router with the gate layered over every route
    let app = Router::new()
        .route("/", get(home))
        .route("/tips/", get(tips))
        .route("/manage/inquiries/pending/", get(pending_inquiries))
        .route("/drafts/rewrite/", get(draft_rewrite))
        .route("/health/", get(|| async { "OK" }))
        .layer(PathGateLayer::new(cache));

    // Start the server
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Test with:");
    tracing::info!("  curl -i http://localhost:3000/manage/inquiries/pending/");
    tracing::info!("  curl -i -H 'x-pathgate-identity: privileged' http://localhost:3000/manage/inquiries/pending/");
    tracing::info!("  curl -i -H 'x-pathgate-identity: privileged' http://localhost:3000/drafts/rewrite/");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
