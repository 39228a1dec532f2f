//! Practice-session data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::speech::SpeechResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

/// A completed practice run as stored on the device. Sync bookkeeping fields
/// (`sync_status`, `retry_count`, `remote_id`, `last_attempt_at`) are owned by
/// the store and only ever transitioned through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub id: String,
    pub user_id: String,
    pub mode: String,
    pub level: String,
    pub kind: String,
    pub tag_ids: Vec<String>,
    pub results: Vec<SpeechResult>,
    pub total_speeches: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub retry_count: u32,
    pub remote_id: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied input for `create_session`. The store assigns the sync
/// bookkeeping fields when the record is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub id: String,
    pub user_id: String,
    pub mode: String,
    pub level: String,
    pub kind: String,
    pub tag_ids: Vec<String>,
    pub results: Vec<SpeechResult>,
    pub total_speeches: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewSession {
    pub fn into_record(self, now: DateTime<Utc>) -> PracticeSession {
        PracticeSession {
            id: self.id,
            user_id: self.user_id,
            mode: self.mode,
            level: self.level,
            kind: self.kind,
            tag_ids: self.tag_ids,
            results: self.results,
            total_speeches: self.total_speeches,
            correct_count: self.correct_count,
            incorrect_count: self.incorrect_count,
            started_at: self.started_at,
            completed_at: self.completed_at,
            sync_status: SyncStatus::Pending,
            retry_count: 0,
            remote_id: None,
            last_attempt_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Summary of a session for history list views (no results payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub user_id: String,
    pub mode: String,
    pub level: String,
    pub kind: String,
    pub total_speeches: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
}

impl From<PracticeSession> for SessionSummary {
    fn from(session: PracticeSession) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            mode: session.mode,
            level: session.level,
            kind: session.kind,
            total_speeches: session.total_speeches,
            correct_count: session.correct_count,
            incorrect_count: session.incorrect_count,
            started_at: session.started_at,
            completed_at: session.completed_at,
            sync_status: session.sync_status,
        }
    }
}
