//! Error types for reconciliation.
//!
//! Errors are grouped into categories so callers can decide what to show
//! the operator and whether anything can be recovered locally. Only one
//! backend condition, [`Error::ReferencedByOtherObjects`] on delete, has a
//! local recovery path.

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message fragment the backend uses when a delete is blocked by referrers.
pub const REFERENCED_MARKER: &str = "can't be deleted since it is pointed from other objects";

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network failure or malformed response.
    Transport,
    /// The backend refused the mutation.
    Backend,
    /// Delete blocked because other objects point at the target.
    Referenced,
    /// Update blocked by a dependency on a profile, practice or behavior.
    Dependency,
    /// The object no longer exists.
    NotFound,
    /// Stored or returned data has an impossible shape.
    DataShape,
    /// Discarding staged changes failed as well.
    Rollback,
}

impl ErrorCategory {
    /// Whether this category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Whether this category points at a defect rather than a user error.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::DataShape)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => "Transport or protocol failure",
            Self::Backend => "Rejected by the management backend",
            Self::Referenced => "Object is still referenced",
            Self::Dependency => "Blocked by a dependent object",
            Self::NotFound => "Object not found",
            Self::DataShape => "Inconsistent stored data",
            Self::Rollback => "Discarding staged changes failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transport => "Check the endpoint and your connection, then try again",
            Self::Backend => "Check the backend message for the rejected field",
            Self::Referenced => "Detach the object from the assets that use it",
            Self::Dependency => "Remove the dependency from the declaration and apply again",
            Self::NotFound => "Run `policyctl read` to refresh the cached state",
            Self::DataShape => "Refresh the cached state; if it persists, report a bug",
            Self::Rollback => "Discard pending changes manually in the management portal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The object whose presence blocked an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyBlocker {
    Profile(String),
    Practice(String),
    Behavior(String),
}

impl DependencyBlocker {
    /// Backend ID of the blocking object.
    pub fn id(&self) -> &str {
        match self {
            Self::Profile(id) | Self::Practice(id) | Self::Behavior(id) => id,
        }
    }
}

impl fmt::Display for DependencyBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(id) => write!(f, "profile {id}"),
            Self::Practice(id) => write!(f, "practice {id}"),
            Self::Behavior(id) => write!(f, "behavior {id}"),
        }
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed or the response could not be read.
    #[error("transport failed: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Response did not have the expected GraphQL shape.
    #[error("invalid response: {0}")]
    Protocol(String),

    /// Backend business error that has no local recovery.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// Delete refused because other objects still reference the target.
    #[error("backend error: {message}")]
    ReferencedByOtherObjects { message: String },

    /// Update refused because of a dependent object.
    #[error("blocked by {blocker}: {message}")]
    Dependency {
        message: String,
        blocker: DependencyBlocker,
    },

    /// Object does not exist on the backend.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Composite ID without its separator.
    #[error("malformed composite id {raw:?}: missing separator {separator:?}")]
    MalformedCompositeId {
        raw: String,
        separator: &'static str,
    },

    /// Two settings claim the same virtual namespace.
    #[error("conflicting virtual setting {key}: {existing:?} vs {conflicting:?}")]
    ConflictingVirtualSetting {
        key: String,
        existing: String,
        conflicting: String,
    },

    /// Structural conversion failed.
    #[error("cannot convert {context}: {message}")]
    Conversion { context: String, message: String },

    /// The backend answered a mutation with `false`.
    #[error("{operation} was not accepted by the backend")]
    Rejected { operation: String },

    /// A referrer of a type whose references cannot be removed.
    #[error("cannot detach from {object_type} {id} of type {sub_type:?}")]
    UnsupportedReferrer {
        object_type: String,
        sub_type: String,
        id: String,
    },

    /// Referrers could not be detached before a delete retry.
    #[error("{original}; repairing references failed: {source}")]
    RepairFailed {
        original: String,
        #[source]
        source: Box<Error>,
    },

    /// The original failure, plus the failure of the discard that followed it.
    #[error("{source}; discarding staged changes also failed: {discard}")]
    RolledBack {
        #[source]
        source: Box<Error>,
        discard: Box<Error>,
    },

    /// JSON encoding or decoding failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Transport {
            message: message.into(),
            status,
        }
    }

    /// Create a conversion error carrying the offending context.
    pub fn conversion(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Classify a backend error message.
    ///
    /// Only the "still referenced" condition is distinguished; every other
    /// message is surfaced as-is.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(REFERENCED_MARKER) {
            Self::ReferencedByOtherObjects { message }
        } else {
            Self::Backend { message }
        }
    }

    /// Attach a failed discard to this error. The original stays primary.
    #[must_use]
    pub fn with_discard(self, discard: Self) -> Self {
        Self::RolledBack {
            source: Box::new(self),
            discard: Box::new(discard),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } | Self::Protocol(_) | Self::Json(_) => ErrorCategory::Transport,
            Self::Backend { .. } | Self::Rejected { .. } => ErrorCategory::Backend,
            Self::ReferencedByOtherObjects { .. }
            | Self::UnsupportedReferrer { .. }
            | Self::RepairFailed { .. } => ErrorCategory::Referenced,
            Self::Dependency { .. } => ErrorCategory::Dependency,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MalformedCompositeId { .. }
            | Self::ConflictingVirtualSetting { .. }
            | Self::Conversion { .. } => ErrorCategory::DataShape,
            Self::RolledBack { .. } => ErrorCategory::Rollback,
        }
    }

    /// Whether the delete was blocked by referrers.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        matches!(self, Self::ReferencedByOtherObjects { .. })
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
