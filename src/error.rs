//! Error types for reviewit

use thiserror::Error;

/// Errors surfaced by reviewit operations
///
/// Git commands that exit non-zero are not represented here: a failed
/// `git am` or `git push` is an expected integration outcome, recorded as
/// `needs_rebase` plus a log entry rather than returned as an error.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing API token, or client version mismatch
    #[error("{0}")]
    Authentication(String),

    /// Unresolved merge request, project, user, or patch reference
    #[error("not found: {0}")]
    NotFound(String),

    /// An entity invariant was violated
    #[error("{field} {message}")]
    Validation {
        /// Offending field name
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// A git process could not be run, or a synchronous git step failed
    #[error("git error: {0}")]
    Git(String),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(String),

    /// Invalid or unreadable configuration
    #[error("config error: {0}")]
    Config(String),

    /// CI status query failed for a reason other than timeout
    #[error("CI error: {0}")]
    Ci(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a validation failure on `field`
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether a hosting API layer should report this as a client error
    /// (bad request / unauthorized) rather than a server fault.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::Validation { .. } | Self::NotFound(_)
        )
    }
}

/// Result type for reviewit operations
pub type Result<T> = std::result::Result<T, Error>;
