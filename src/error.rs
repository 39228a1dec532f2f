//! Error taxonomy for the sync core.
//!
//! Failure handling is explicit at every call site: callers match on the
//! variant rather than catching exceptions. `Validation` and `Persistence`
//! are returned synchronously to the immediate caller; sync-time failures are
//! recorded on the session record and surfaced only in aggregate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Caller-supplied data violates an invariant. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The record is already being processed or already synced. Drains skip
    /// these silently; they are not surfaced to the UI.
    #[error("session {0} is already claimed or synced")]
    Conflict(String),

    /// Network or server-side failure worth retrying per the backoff policy.
    #[error("transient sync failure: {0}")]
    Transient(String),

    /// The remote rejected our credentials. Requires external
    /// re-authentication before any further retry; does not consume a
    /// retry-count increment.
    #[error("authentication expired")]
    AuthExpired,

    /// Local store failure. Fatal to the current operation; transactional
    /// writes guarantee no partial state is left behind.
    #[error("local persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
