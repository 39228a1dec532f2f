use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};

use super::{backoff, config::SyncConfig};
use crate::connectivity::Connectivity;
use crate::db::{Database, PracticeSession, SyncStatus};
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteError, SessionUplink};

/// What caused a drain pass. Manual triggers bypass both the backoff gate and
/// the retry cap so a pull-to-refresh can resurrect permanently failed
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Interval,
    ConnectivityRegained,
    Manual,
}

impl SyncTrigger {
    fn is_manual(&self) -> bool {
        matches!(self, SyncTrigger::Manual)
    }

    fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Interval => "interval",
            SyncTrigger::ConnectivityRegained => "connectivity-regained",
            SyncTrigger::Manual => "manual",
        }
    }
}

/// Tally of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Sessions that transitioned to `synced` in this pass.
    pub synced: usize,
    /// Sessions that failed this attempt and were left `failed`.
    pub failed: usize,
    /// Sessions skipped because another drain already claimed them.
    pub skipped: usize,
    /// Set when the pass was aborted on expired credentials; the host must
    /// re-authenticate before the next attempt will get anywhere.
    pub auth_expired: bool,
}

/// Drains locally persisted sessions to the remote system of record.
///
/// All state lives in the store; the engine itself is stateless and safe to
/// share. Concurrent drains are tolerated: mutual exclusion happens per
/// record at the store's `mark_syncing` guard, never by serializing passes.
pub struct SyncEngine {
    db: Database,
    connectivity: Arc<dyn Connectivity>,
    uplink: Arc<dyn SessionUplink>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        db: Database,
        connectivity: Arc<dyn Connectivity>,
        uplink: Arc<dyn SessionUplink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            db,
            connectivity,
            uplink,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// One drain pass. Returns without touching any record when the remote is
    /// unreachable. A failure on one session never aborts the others; the
    /// only early exit is expired credentials, which would fail every
    /// remaining upload anyway.
    pub async fn drain(&self, trigger: SyncTrigger) -> SyncResult<DrainReport> {
        let mut report = DrainReport::default();

        if !self.connectivity.is_reachable().await {
            debug!("Drain ({}) skipped: remote unreachable", trigger.as_str());
            return Ok(report);
        }

        let now = Utc::now();
        let candidates = self
            .db
            .list_sync_candidates(now, self.config.stale_syncing_after, self.config.batch_limit)
            .await?;

        if candidates.is_empty() {
            debug!("Drain ({}): nothing to sync", trigger.as_str());
            return Ok(report);
        }

        debug!(
            "Drain ({}): {} candidate(s)",
            trigger.as_str(),
            candidates.len()
        );

        for session in candidates {
            if !trigger.is_manual() && !self.eligible_for_auto_retry(&session, now) {
                continue;
            }

            match self
                .db
                .mark_syncing(&session.id, Utc::now(), self.config.stale_syncing_after)
                .await
            {
                Ok(()) => {}
                Err(SyncError::Conflict(_)) => {
                    report.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            }

            match self.uplink.push_session(&session).await {
                Ok(ack) => {
                    match self
                        .db
                        .mark_synced(&session.id, &ack.remote_id, Utc::now())
                        .await
                    {
                        Ok(()) => {
                            info!(
                                "Session {} synced (remote id {})",
                                session.id, ack.remote_id
                            );
                            report.synced += 1;
                        }
                        Err(SyncError::Conflict(_)) => {
                            // Another drain reclaimed the record mid-upload.
                            // The server dedups on client id, so just move on.
                            warn!("Session {} changed hands mid-upload", session.id);
                            report.skipped += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
                Err(RemoteError::AuthExpired) => {
                    warn!(
                        "Drain ({}) aborted: credentials expired at session {}",
                        trigger.as_str(),
                        session.id
                    );
                    self.release_quietly(&session.id).await;
                    report.auth_expired = true;
                    break;
                }
                Err(RemoteError::Rejected(msg)) => {
                    error!("Session {} rejected by remote: {msg}", session.id);
                    self.fail_quietly(&session.id).await;
                    report.failed += 1;
                }
                Err(RemoteError::Transient(msg)) => {
                    warn!("Session {} upload failed: {msg}", session.id);
                    self.fail_quietly(&session.id).await;
                    report.failed += 1;
                }
            }
        }

        info!(
            "Drain ({}) complete: {} synced, {} failed, {} skipped",
            trigger.as_str(),
            report.synced,
            report.failed,
            report.skipped
        );

        Ok(report)
    }

    fn eligible_for_auto_retry(&self, session: &PracticeSession, now: chrono::DateTime<Utc>) -> bool {
        if session.sync_status == SyncStatus::Failed
            && session.retry_count >= self.config.max_retry_attempts
        {
            return false;
        }
        // Stale `syncing` records came through the candidate query precisely
        // because their last attempt is old, so the backoff gate passes too.
        backoff::is_due(session.retry_count, session.last_attempt_at, now)
    }

    async fn fail_quietly(&self, session_id: &str) {
        if let Err(err) = self.db.mark_failed(session_id, Utc::now()).await {
            error!("Failed to record sync failure for {session_id}: {err}");
        }
    }

    async fn release_quietly(&self, session_id: &str) {
        if let Err(err) = self.db.release_syncing(session_id, Utc::now()).await {
            error!("Failed to release claim on {session_id}: {err}");
        }
    }
}
