//! Path gate middleware for axum.
//!
//! This module provides the [`PathGateLayer`] and [`PathGateMiddleware`]
//! types that integrate the visibility decision into the request pipeline.
//!
//! Per request: paths on the [`BypassList`] pass straight through; for
//! everything else the current rule snapshot is evaluated with the caller's
//! identity. Allowed requests continue unchanged. Denied requests resolve
//! to a plain 404 — except an anonymous caller hitting a privileged-only
//! area, who is redirected to the login entry point with the requested path
//! preserved for post-login return.

use crate::cache::RuleCache;
use crate::identity::{HeaderIdentityExtractor, IdentityExtractor};
use crate::rule::Visibility;
use crate::snapshot::Decision;

use futures_util::future::BoxFuture;
use http::{header, Request, Response, StatusCode};
use http_body::Body;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Default authentication entry point for login redirects.
pub const DEFAULT_LOGIN_PATH: &str = "/accounts/login/";

/// Default query parameter carrying the originally requested path.
pub const DEFAULT_NEXT_PARAM: &str = "next";

/// Literal paths exempt from rule evaluation.
///
/// Bypassed paths never consult the rule cache or the store. The default
/// set covers the admin tool (which manages its own access control and must
/// not be lockable through rules it serves), static asset and media
/// prefixes, and the liveness-check path (which must answer even when the
/// rule store is down).
#[derive(Debug, Clone)]
pub struct BypassList {
    prefixes: Vec<String>,
    exact: Vec<String>,
}

impl BypassList {
    /// An empty bypass list: every path is evaluated.
    pub fn none() -> Self {
        Self {
            prefixes: Vec::new(),
            exact: Vec::new(),
        }
    }

    /// Exempt every path starting with a prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Exempt one exact path.
    pub fn exact(mut self, path: impl Into<String>) -> Self {
        self.exact.push(path.into());
        self
    }

    /// The exempted prefixes.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// The exempted exact paths.
    pub fn exact_paths(&self) -> &[String] {
        &self.exact
    }

    /// Check if a request path is exempt.
    pub fn matches(&self, path: &str) -> bool {
        self.exact.iter().any(|exempt| exempt == path)
            || self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Default for BypassList {
    fn default() -> Self {
        Self::none()
            .prefix("/admin/")
            .prefix("/static/")
            .prefix("/media/")
            .exact("/health/")
    }
}

/// Configuration shared by the layer and its services.
pub struct GateConfig<X> {
    /// The rule cache consulted per request.
    pub cache: Arc<RuleCache>,
    /// The identity extractor.
    pub extractor: Arc<X>,
    /// Paths exempt from evaluation.
    pub bypass: Arc<BypassList>,
    /// Authentication entry point for anonymous callers on privileged paths.
    pub login_path: String,
    /// Query parameter carrying the requested path through the login flow.
    pub next_param: String,
}

// Manual Clone impl to avoid requiring X: Clone (it is behind an Arc).
impl<X> Clone for GateConfig<X> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            extractor: self.extractor.clone(),
            bypass: self.bypass.clone(),
            login_path: self.login_path.clone(),
            next_param: self.next_param.clone(),
        }
    }
}

/// A tower layer that gates requests on path-visibility rules.
///
/// # Example
/// ```no_run
/// use axum::{routing::get, Router};
/// use axum_pathgate::{MemoryRuleStore, NewRule, PathGateLayer, RuleCache, Visibility};
/// use std::sync::Arc;
///
/// async fn handler() -> &'static str {
///     "Hello!"
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let store = Arc::new(
///         MemoryRuleStore::with_rules(vec![
///             NewRule::new("/manage/").visibility(Visibility::PrivilegedOnly).priority(1),
///         ])
///         .unwrap(),
///     );
///     let cache = Arc::new(RuleCache::new(store));
///
///     let app = Router::new()
///         .route("/", get(handler))
///         .route("/manage/inquiries/", get(handler))
///         .layer(PathGateLayer::new(cache.clone()));
///
///     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
///     axum::serve(listener, app).await.unwrap();
/// }
/// ```
pub struct PathGateLayer<X> {
    config: GateConfig<X>,
}

impl<X> Clone for PathGateLayer<X> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl PathGateLayer<HeaderIdentityExtractor> {
    /// Create a layer over a rule cache.
    ///
    /// Uses the default header identity extractor (for trusted-proxy
    /// deployments; see [`HeaderIdentityExtractor`]), the default
    /// [`BypassList`], and the default login path.
    pub fn new(cache: Arc<RuleCache>) -> Self {
        Self {
            config: GateConfig {
                cache,
                extractor: Arc::new(HeaderIdentityExtractor::default()),
                bypass: Arc::new(BypassList::default()),
                login_path: DEFAULT_LOGIN_PATH.to_string(),
                next_param: DEFAULT_NEXT_PARAM.to_string(),
            },
        }
    }
}

impl<X> PathGateLayer<X> {
    /// Use a custom identity extractor.
    ///
    /// # Example
    /// ```
    /// use axum_pathgate::{ExtensionIdentityExtractor, Identity, MemoryRuleStore, PathGateLayer, RuleCache};
    /// use std::sync::Arc;
    ///
    /// #[derive(Clone)]
    /// struct AuthUser { staff: bool }
    ///
    /// let cache = Arc::new(RuleCache::new(Arc::new(MemoryRuleStore::new())));
    /// let layer = PathGateLayer::new(cache).with_identity_extractor(
    ///     ExtensionIdentityExtractor::<AuthUser>::new(|user| Identity::from_flags(true, user.staff)),
    /// );
    /// ```
    pub fn with_identity_extractor<X2>(self, extractor: X2) -> PathGateLayer<X2> {
        PathGateLayer {
            config: GateConfig {
                cache: self.config.cache,
                extractor: Arc::new(extractor),
                bypass: self.config.bypass,
                login_path: self.config.login_path,
                next_param: self.config.next_param,
            },
        }
    }

    /// Replace the bypass list.
    pub fn with_bypass(mut self, bypass: BypassList) -> Self {
        self.config.bypass = Arc::new(bypass);
        self
    }

    /// Set the authentication entry point anonymous callers are redirected
    /// to. Must be a rooted path (optionally with a query string); values
    /// that are not valid header text would make the redirect fail.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.config.login_path = path.into();
        self
    }

    /// Set the query parameter used to carry the requested path through the
    /// login flow.
    pub fn with_next_param(mut self, param: impl Into<String>) -> Self {
        self.config.next_param = param.into();
        self
    }

    /// The rule cache this layer consults.
    pub fn cache(&self) -> &RuleCache {
        &self.config.cache
    }
}

impl<S, X> Layer<S> for PathGateLayer<X> {
    type Service = PathGateMiddleware<S, X>;

    fn layer(&self, inner: S) -> Self::Service {
        PathGateMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

/// The path gate middleware service.
pub struct PathGateMiddleware<S, X> {
    inner: S,
    config: GateConfig<X>,
}

impl<S: Clone, X> Clone for PathGateMiddleware<S, X> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, X, ReqBody, ResBody> Service<Request<ReqBody>> for PathGateMiddleware<S, X>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    X: IdentityExtractor<ReqBody> + 'static,
    ReqBody: Body + Send + 'static,
    ResBody: Body + Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        let path = request.uri().path().to_string();
        // Path and query, preserved through the login flow.
        let full_path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());

        let bypassed = config.bypass.matches(&path);
        // Extract the identity synchronously before entering the async block.
        let identity = config.extractor.extract(&request);

        Box::pin(async move {
            if bypassed {
                tracing::trace!(path = %path, "path bypasses visibility rules");
                return inner.call(request).await;
            }

            let snapshot = match config.cache.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    // Neither allow-all nor deny-all is verifiably safe
                    // without rules, so the request fails as a service
                    // outage.
                    tracing::error!(
                        path = %path,
                        error = %err,
                        "visibility rules unavailable, failing request"
                    );
                    let response = Response::builder()
                        .status(StatusCode::SERVICE_UNAVAILABLE)
                        .body(ResBody::default())
                        .unwrap();
                    return Ok(response);
                }
            };

            let (decision, matched) = snapshot.evaluate_with_match(&path, identity.is_privileged());
            match decision {
                Decision::Allow => {
                    tracing::trace!(
                        path = %path,
                        authenticated = identity.is_authenticated(),
                        privileged = identity.is_privileged(),
                        "visibility rules allowed request"
                    );
                    inner.call(request).await
                }
                Decision::NotFound => {
                    let offer_login = !identity.is_authenticated()
                        && matched
                            .map(|rule| rule.visibility == Visibility::PrivilegedOnly)
                            .unwrap_or(false);

                    if offer_login {
                        let location =
                            login_redirect(&config.login_path, &config.next_param, &full_path);
                        tracing::info!(
                            path = %path,
                            location = %location,
                            "anonymous caller redirected to login for privileged path"
                        );
                        let response = Response::builder()
                            .status(StatusCode::FOUND)
                            .header(header::LOCATION, location)
                            .body(ResBody::default())
                            .unwrap();
                        Ok(response)
                    } else {
                        tracing::info!(
                            path = %path,
                            authenticated = identity.is_authenticated(),
                            privileged = identity.is_privileged(),
                            "path hidden from caller"
                        );
                        let response = Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(ResBody::default())
                            .unwrap();
                        Ok(response)
                    }
                }
            }
        })
    }
}

/// Build the login redirect target, carrying the requested path in the
/// configured query parameter.
fn login_redirect(login_path: &str, next_param: &str, requested: &str) -> String {
    let sep = if login_path.contains('?') { '&' } else { '?' };
    format!(
        "{login_path}{sep}{next_param}={}",
        urlencoding::encode(requested)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::identity::{FixedIdentityExtractor, Identity};
    use crate::rule::AccessRule;
    use crate::store::{MemoryRuleStore, NewRule, RuleStore, RuleUpdate};
    use async_trait::async_trait;
    use axum::body::Body as AxumBody;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    /// Store that is always down, for proving what never touches it.
    struct OutageStore;

    #[async_trait]
    impl RuleStore for OutageStore {
        async fn list_active(&self) -> Result<Vec<AccessRule>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn create(&self, _rule: NewRule) -> Result<AccessRule, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn update(&self, _pattern: &str, _change: RuleUpdate) -> Result<AccessRule, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    fn seeded_cache() -> Arc<RuleCache> {
        let store = Arc::new(
            MemoryRuleStore::with_rules(vec![
                NewRule::new("/manage/")
                    .visibility(Visibility::PrivilegedOnly)
                    .priority(1),
                NewRule::new("/secret/").visibility(Visibility::Hidden).priority(1),
            ])
            .unwrap(),
        );
        Arc::new(RuleCache::new(store))
    }

    fn app(cache: Arc<RuleCache>, identity: Identity) -> Router {
        Router::new()
            .route("/", get(|| async { "home" }))
            .route("/about/", get(|| async { "about" }))
            .route("/manage/inquiries/pending/", get(|| async { "pending" }))
            .route("/health/", get(|| async { "ok" }))
            .layer(
                PathGateLayer::new(cache)
                    .with_identity_extractor(FixedIdentityExtractor::new(identity)),
            )
    }

    async fn send(app: Router, uri: &str) -> Response<AxumBody> {
        app.oneshot(
            Request::builder()
                .uri(uri)
                .body(AxumBody::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_unruled_paths_flow_through() {
        let response = send(app(seeded_cache(), Identity::anonymous()), "/about/").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_anonymous_caller_gets_login_redirect() {
        let response = send(
            app(seeded_cache(), Identity::anonymous()),
            "/manage/inquiries/pending/",
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(
            location,
            "/accounts/login/?next=%2Fmanage%2Finquiries%2Fpending%2F"
        );
    }

    #[tokio::test]
    async fn test_member_gets_not_found_on_privileged_path() {
        let response = send(
            app(seeded_cache(), Identity::member()),
            "/manage/inquiries/pending/",
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_privileged_caller_passes() {
        let response = send(
            app(seeded_cache(), Identity::privileged()),
            "/manage/inquiries/pending/",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_hidden_is_not_found_for_everyone() {
        for identity in [Identity::anonymous(), Identity::member(), Identity::privileged()] {
            let response = send(app(seeded_cache(), identity), "/secret/anything").await;
            // No login redirect for hidden paths, not even for anonymous
            // callers.
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_redirect_preserves_query_string() {
        let response = send(
            app(seeded_cache(), Identity::anonymous()),
            "/manage/inquiries/pending/?page=2",
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(
            location,
            "/accounts/login/?next=%2Fmanage%2Finquiries%2Fpending%2F%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn test_login_path_with_query_joins_with_ampersand() {
        let cache = seeded_cache();
        let router = Router::new()
            .route("/manage/inquiries/pending/", get(|| async { "pending" }))
            .layer(
                PathGateLayer::new(cache)
                    .with_identity_extractor(FixedIdentityExtractor::new(Identity::anonymous()))
                    .with_login_path("/login/?source=gate"),
            );
        let response = send(router, "/manage/inquiries/pending/").await;
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with("/login/?source=gate&next="));
    }

    #[tokio::test]
    async fn test_bypass_paths_skip_rule_evaluation() {
        // The store is down; only bypassed paths can possibly answer.
        let cache = Arc::new(RuleCache::new(Arc::new(OutageStore)));
        let response = send(app(cache, Identity::anonymous()), "/health/").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cold_cache_outage_is_a_service_failure() {
        let cache = Arc::new(RuleCache::new(Arc::new(OutageStore)));
        let response = send(app(cache, Identity::privileged()), "/").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_bypass_list_matching() {
        let bypass = BypassList::default();
        assert!(bypass.matches("/admin/"));
        assert!(bypass.matches("/admin/login/"));
        assert!(bypass.matches("/static/css/site.css"));
        assert!(bypass.matches("/media/uploads/logo.png"));
        assert!(bypass.matches("/health/"));
        // Exact entries do not match their children.
        assert!(!bypass.matches("/health/db/"));
        assert!(!bypass.matches("/manage/"));
    }

    #[test]
    fn test_login_redirect_encoding() {
        assert_eq!(
            login_redirect("/accounts/login/", "next", "/manage/clients/active/"),
            "/accounts/login/?next=%2Fmanage%2Fclients%2Factive%2F"
        );
        assert_eq!(
            login_redirect("/login/?a=1", "return", "/x/"),
            "/login/?a=1&return=%2Fx%2F"
        );
    }
}
