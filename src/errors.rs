//! Unified error type for `RupeeWise`.
//!
//! Every workflow returns [`Result`]. The variants follow the taxonomy the
//! presentation layer reacts to: validation errors are shown inline on the
//! originating form, authorization and lookup failures abort without retry,
//! upstream outages may be retried once for reads, and partial aggregation
//! failures degrade to a warning.

use sea_orm::DbErr;
use thiserror::Error;

/// Errors produced by the aggregation engine and the account/request workflows.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller lacks the role or ownership required for the operation
    #[error("Not authorized: {reason}")]
    NotAuthorized { reason: String },

    /// Referenced entity does not exist or is outside the caller's household
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed input on a form field
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Entity exists but is not in a state that permits the transition
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Identity provider or document store failed for a transient reason
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// Some per-owner fetches of a household aggregation failed
    #[error("Loaded {loaded} expenses but {failed} source(s) failed: {sources}")]
    PartialAggregationFailure {
        loaded: usize,
        failed: usize,
        sources: String,
    },

    /// Provisioning failed after the identity principal was created and the
    /// orphaned principal could not be removed
    #[error("Account may be partially created for {child_id}: {message}")]
    AccountPartiallyCreated { child_id: String, message: String },

    /// A stored document could not be mapped onto the domain model
    #[error("Invalid {collection} record {id}: {message}")]
    InvalidRecord {
        collection: &'static str,
        id: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotAuthorized`] error.
    pub fn not_authorized(reason: impl Into<String>) -> Self {
        Self::NotAuthorized {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`] error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether an idempotent read may be retried after this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

impl From<DbErr> for Error {
    fn from(value: DbErr) -> Self {
        match value {
            DbErr::ConnectionAcquire(e) => Self::UpstreamUnavailable {
                service: "document store",
                message: e.to_string(),
            },
            DbErr::Conn(e) => Self::UpstreamUnavailable {
                service: "document store",
                message: e.to_string(),
            },
            other => Self::Database {
                message: other.to_string(),
            },
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
