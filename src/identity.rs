//! Identity extraction from HTTP requests.
//!
//! The gate does not validate sessions or credentials. It consumes an
//! already-authenticated [`Identity`] supplied by the host's authentication
//! subsystem: two booleans, authenticated and privileged, passed into the
//! evaluation rather than reached for via ambient state.
//!
//! Implement [`IdentityExtractor`] to bridge whatever the host's auth
//! middleware produces (a request extension, a trusted proxy header) into
//! an [`Identity`].

use http::Request;
use std::sync::Arc;

/// Header name the default extractor reads. Intended for deployments where
/// a trusted reverse proxy authenticates requests and stamps the identity
/// class; see [`HeaderIdentityExtractor`].
pub const DEFAULT_IDENTITY_HEADER: &str = "x-pathgate-identity";

/// An already-authenticated caller's capabilities.
///
/// Privileged implies authenticated; the constructors and
/// [`from_flags`](Identity::from_flags) keep that invariant, so a
/// "privileged but anonymous" identity cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    authenticated: bool,
    privileged: bool,
}

impl Identity {
    /// An unauthenticated caller.
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            privileged: false,
        }
    }

    /// An authenticated caller without privileged access.
    pub fn member() -> Self {
        Self {
            authenticated: true,
            privileged: false,
        }
    }

    /// An authenticated, privileged caller (administrator/staff-equivalent).
    pub fn privileged() -> Self {
        Self {
            authenticated: true,
            privileged: true,
        }
    }

    /// Build an identity from raw flags. A privileged flag without an
    /// authenticated flag is normalized down to anonymous, preserving the
    /// privileged-implies-authenticated invariant.
    pub fn from_flags(authenticated: bool, privileged: bool) -> Self {
        Self {
            authenticated,
            privileged: privileged && authenticated,
        }
    }

    /// Whether the caller is authenticated at all.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the caller may view privileged-only paths.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Trait for extracting the caller's identity from an HTTP request.
///
/// The trait is synchronous because extraction reads headers or request
/// extensions already populated by earlier middleware; anything requiring
/// I/O belongs in the host's authentication layer, not here.
///
/// # Example
/// ```
/// use axum_pathgate::{Identity, IdentityExtractor};
/// use http::Request;
///
/// /// Session data inserted by the host's auth middleware.
/// #[derive(Clone)]
/// struct Session {
///     user_id: u64,
///     staff: bool,
/// }
///
/// struct SessionIdentityExtractor;
///
/// impl<B> IdentityExtractor<B> for SessionIdentityExtractor {
///     fn extract(&self, request: &Request<B>) -> Identity {
///         match request.extensions().get::<Session>() {
///             Some(session) if session.staff => Identity::privileged(),
///             Some(_) => Identity::member(),
///             None => Identity::anonymous(),
///         }
///     }
/// }
/// ```
pub trait IdentityExtractor<B>: Send + Sync {
    /// Extract the caller's identity. Absence of identity information is an
    /// anonymous caller, not an error.
    fn extract(&self, request: &Request<B>) -> Identity;
}

impl<B, T: IdentityExtractor<B>> IdentityExtractor<B> for Arc<T> {
    fn extract(&self, request: &Request<B>) -> Identity {
        (**self).extract(request)
    }
}

impl<B, T: IdentityExtractor<B> + ?Sized> IdentityExtractor<B> for Box<T> {
    fn extract(&self, request: &Request<B>) -> Identity {
        (**self).extract(request)
    }
}

/// Extract the identity class from a trusted header.
///
/// The header value is matched case-insensitively: `privileged` (or
/// `staff`) and `member` name the two authenticated classes; anything else,
/// including a missing or unreadable header, is anonymous.
///
/// Only use this behind a reverse proxy that strips the header from client
/// traffic and sets it after authenticating; a client that can reach the
/// service directly could otherwise grant itself privilege.
///
/// # Example
/// ```
/// use axum_pathgate::HeaderIdentityExtractor;
///
/// let extractor = HeaderIdentityExtractor::new("x-auth-class");
/// ```
#[derive(Debug, Clone)]
pub struct HeaderIdentityExtractor {
    header_name: String,
}

impl HeaderIdentityExtractor {
    /// Create an extractor reading the given header.
    pub fn new(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
        }
    }
}

impl Default for HeaderIdentityExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_HEADER)
    }
}

impl<B> IdentityExtractor<B> for HeaderIdentityExtractor {
    fn extract(&self, request: &Request<B>) -> Identity {
        let value = request
            .headers()
            .get(&self.header_name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or("");
        if value.eq_ignore_ascii_case("privileged") || value.eq_ignore_ascii_case("staff") {
            Identity::privileged()
        } else if value.eq_ignore_ascii_case("member") {
            Identity::member()
        } else {
            Identity::anonymous()
        }
    }
}

/// Extract the identity from a request extension.
///
/// Looks for a value of type `T` that an earlier authentication middleware
/// inserted into the request extensions and maps it to an [`Identity`]. A
/// missing extension is an anonymous caller.
///
/// # Example
/// ```
/// use axum_pathgate::{ExtensionIdentityExtractor, Identity};
///
/// #[derive(Clone)]
/// struct AuthUser {
///     staff: bool,
/// }
///
/// let extractor = ExtensionIdentityExtractor::<AuthUser>::new(|user| {
///     Identity::from_flags(true, user.staff)
/// });
/// ```
pub struct ExtensionIdentityExtractor<T> {
    extract_fn: Box<dyn Fn(&T) -> Identity + Send + Sync>,
}

impl<T> ExtensionIdentityExtractor<T> {
    /// Create an extension extractor with a mapping function.
    pub fn new<F>(extract_fn: F) -> Self
    where
        F: Fn(&T) -> Identity + Send + Sync + 'static,
    {
        Self {
            extract_fn: Box::new(extract_fn),
        }
    }
}

impl<T> std::fmt::Debug for ExtensionIdentityExtractor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionIdentityExtractor")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<B, T: Clone + Send + Sync + 'static> IdentityExtractor<B> for ExtensionIdentityExtractor<T> {
    fn extract(&self, request: &Request<B>) -> Identity {
        match request.extensions().get::<T>() {
            Some(ext) => (self.extract_fn)(ext),
            None => Identity::anonymous(),
        }
    }
}

/// An extractor that always returns the same identity.
///
/// Useful for tests and for demos that want to pin the caller class.
#[derive(Debug, Clone)]
pub struct FixedIdentityExtractor {
    identity: Identity,
}

impl FixedIdentityExtractor {
    /// Create an extractor that always reports the given identity.
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

impl<B> IdentityExtractor<B> for FixedIdentityExtractor {
    fn extract(&self, _request: &Request<B>) -> Identity {
        self.identity
    }
}
