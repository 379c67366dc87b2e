//! Error types for the path gate.
//!
//! Denied requests are not errors: they resolve to normal HTTP outcomes
//! (not-found or a login redirect) inside the middleware. The types here
//! cover rule validation at write time and the rule store contract.

/// Error returned when a rule pattern fails write-time validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The pattern was empty after trimming surrounding whitespace.
    #[error("rule pattern must not be empty")]
    EmptyPattern,

    /// The pattern does not start with `/`.
    #[error("rule pattern must be rooted at '/': '{0}'")]
    UnrootedPattern(String),
}

/// Error type for rule store operations.
///
/// Store backends map their transport failures into [`StoreError::Unavailable`];
/// the validation and uniqueness variants are produced at write time and are
/// never retried by the cache.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the query failed transiently.
    #[error("rule store unavailable: {0}")]
    Unavailable(String),

    /// A rule with the same pattern already exists.
    #[error("a rule for pattern '{0}' already exists")]
    DuplicatePattern(String),

    /// No rule exists for the pattern named in an update.
    #[error("no rule found for pattern '{0}'")]
    UnknownPattern(String),

    /// The submitted rule failed validation.
    #[error("invalid rule: {0}")]
    InvalidRule(#[from] RuleError),
}

impl StoreError {
    /// Whether the error is a transient store outage (retried via the
    /// cache's grace-period fallback) rather than a rejected write.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
