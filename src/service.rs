use std::sync::Arc;

use chrono::Utc;
use log::info;

use crate::connectivity::Connectivity;
use crate::db::{Database, NewSession, PracticeSession, SessionQuery, SessionSummary};
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteError, SessionUplink, SpeechPrompt};
use crate::sync::{DrainReport, SyncEngine, SyncTrigger};

const SPEECH_FETCH_MIN: u32 = 1;
const SPEECH_FETCH_MAX: u32 = 50;

/// Single entry point for the host application.
///
/// Composes the store, the sync engine and the connectivity observer, and
/// owns the business rules: input validation, filtering, pagination.
/// `create_session` touches only local persistence and returns immediately;
/// the network is only ever blocked on inside a drain.
pub struct SessionService {
    db: Database,
    engine: Arc<SyncEngine>,
    connectivity: Arc<dyn Connectivity>,
    uplink: Arc<dyn SessionUplink>,
}

impl SessionService {
    pub fn new(
        db: Database,
        engine: Arc<SyncEngine>,
        connectivity: Arc<dyn Connectivity>,
        uplink: Arc<dyn SessionUplink>,
    ) -> Self {
        Self {
            db,
            engine,
            connectivity,
            uplink,
        }
    }

    /// Validates and persists a completed session with status `pending`.
    pub async fn create_session(&self, new: NewSession) -> SyncResult<PracticeSession> {
        validate_new_session(&new)?;

        let record = new.into_record(Utc::now());
        self.db.insert_session(&record).await?;

        info!(
            "Session {} recorded locally ({} speeches)",
            record.id, record.total_speeches
        );

        Ok(record)
    }

    pub async fn get_session(&self, session_id: &str) -> SyncResult<Option<PracticeSession>> {
        self.db.get_session(session_id).await
    }

    /// Completed sessions for history views, newest first.
    pub async fn session_history(&self, query: SessionQuery) -> SyncResult<Vec<SessionSummary>> {
        if query.limit == 0 {
            return Err(SyncError::validation("limit must be greater than zero"));
        }
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(SyncError::validation("date range start is after its end"));
            }
        }

        self.db.query_sessions(&query).await
    }

    /// Sessions not yet reconciled with the remote system ("N sessions
    /// pending sync").
    pub async fn pending_sync_count(&self) -> SyncResult<u64> {
        self.db.count_unsynced().await
    }

    /// Manual drain (pull-to-refresh). Bypasses the backoff gate and the
    /// retry cap.
    pub async fn sync_pending_sessions(&self) -> SyncResult<DrainReport> {
        self.engine.drain(SyncTrigger::Manual).await
    }

    pub async fn is_connected(&self) -> bool {
        self.connectivity.is_reachable().await
    }

    /// Fetches the next batch of practice prompts from the backend.
    pub async fn fetch_speeches(&self, count: u32) -> SyncResult<Vec<SpeechPrompt>> {
        if !(SPEECH_FETCH_MIN..=SPEECH_FETCH_MAX).contains(&count) {
            return Err(SyncError::validation(format!(
                "speech count must be between {SPEECH_FETCH_MIN} and {SPEECH_FETCH_MAX}"
            )));
        }

        self.uplink
            .fetch_speeches(count)
            .await
            .map_err(|err| match err {
                RemoteError::AuthExpired => SyncError::AuthExpired,
                RemoteError::Rejected(msg) => SyncError::Validation(msg),
                RemoteError::Transient(msg) => SyncError::Transient(msg),
            })
    }
}

fn validate_new_session(new: &NewSession) -> SyncResult<()> {
    if new.id.is_empty() {
        return Err(SyncError::validation("session id is empty"));
    }
    if new.user_id.is_empty() {
        return Err(SyncError::validation("session has no owner"));
    }
    if new.results.is_empty() {
        return Err(SyncError::validation("session has no speech results"));
    }
    if new.total_speeches as usize != new.results.len() {
        return Err(SyncError::validation(format!(
            "totalSpeeches ({}) does not match result count ({})",
            new.total_speeches,
            new.results.len()
        )));
    }
    if new.correct_count + new.incorrect_count != new.total_speeches {
        return Err(SyncError::validation(
            "correct and incorrect counts do not add up to totalSpeeches",
        ));
    }
    match new.completed_at {
        None => {
            return Err(SyncError::validation(
                "session must be complete before it can be saved",
            ))
        }
        Some(completed_at) if completed_at < new.started_at => {
            return Err(SyncError::validation("completedAt predates startedAt"));
        }
        Some(_) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::models::SpeechResult;

    fn completed_session(total: u32, correct: u32) -> NewSession {
        let started_at = Utc::now() - Duration::minutes(10);
        let results = (0..total)
            .map(|i| SpeechResult {
                correct: i < correct,
                score: Some(0.9),
                transcript: None,
            })
            .collect::<Vec<_>>();

        NewSession {
            id: "s-1".into(),
            user_id: "u-1".into(),
            mode: "listening".into(),
            level: "b1".into(),
            kind: "daily".into(),
            tag_ids: vec!["travel".into()],
            results,
            total_speeches: total,
            correct_count: correct,
            incorrect_count: total - correct,
            started_at,
            completed_at: Some(started_at + Duration::minutes(8)),
        }
    }

    #[test]
    fn accepts_consistent_completed_session() {
        assert!(validate_new_session(&completed_session(5, 3)).is_ok());
    }

    #[test]
    fn rejects_count_mismatch() {
        let mut new = completed_session(5, 3);
        new.total_speeches = 4;
        new.incorrect_count = 1;
        let err = validate_new_session(&new).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_incomplete_session() {
        let mut new = completed_session(5, 3);
        new.completed_at = None;
        assert!(validate_new_session(&new).unwrap_err().is_validation());
    }

    #[test]
    fn rejects_empty_results() {
        let mut new = completed_session(5, 3);
        new.results.clear();
        new.total_speeches = 0;
        new.correct_count = 0;
        new.incorrect_count = 0;
        assert!(validate_new_session(&new).unwrap_err().is_validation());
    }

    #[test]
    fn rejects_completion_before_start() {
        let mut new = completed_session(5, 3);
        new.completed_at = Some(new.started_at - Duration::seconds(1));
        assert!(validate_new_session(&new).unwrap_err().is_validation());
    }

    #[test]
    fn rejects_counter_sum_mismatch() {
        let mut new = completed_session(5, 3);
        new.incorrect_count = 1;
        assert!(validate_new_session(&new).unwrap_err().is_validation());
    }
}
