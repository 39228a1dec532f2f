pub mod http;

pub use http::HttpSessionUplink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::PracticeSession;

/// Failure kinds reported by the remote system of record.
///
/// `Rejected` is permanent for the payload as sent; `AuthExpired` must be
/// resolved by the host's re-authentication flow and never consumes a retry;
/// `Transient` is retried per the backoff policy.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote rejected the session: {0}")]
    Rejected(String),

    #[error("remote authentication expired")]
    AuthExpired,

    #[error("transient remote failure: {0}")]
    Transient(String),
}

/// Acknowledgement for a successfully uploaded session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAck {
    pub remote_id: String,
}

/// A practice item served by the backend for the next exercise round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechPrompt {
    pub id: String,
    pub text: String,
    pub level: String,
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

/// Client for the remote system of record. Implementations must be safe to
/// share across concurrent drains.
#[async_trait]
pub trait SessionUplink: Send + Sync {
    /// Uploads one completed session and returns the server-assigned id.
    async fn push_session(&self, session: &PracticeSession) -> Result<RemoteAck, RemoteError>;

    /// Fetches `count` practice prompts. Count bounds are enforced by the
    /// facade before this is called.
    async fn fetch_speeches(&self, count: u32) -> Result<Vec<SpeechPrompt>, RemoteError>;
}
