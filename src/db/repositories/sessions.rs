use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::db::{
    connection::Database,
    helpers::{
        decode_tags, encode_tags, parse_datetime, parse_optional_datetime, parse_sync_status,
        to_i64, to_u32,
    },
    models::{PracticeSession, SessionSummary, SpeechResult, SyncStatus},
};
use crate::error::{SyncError, SyncResult};

/// Filters for history queries. All fields optional except pagination;
/// results are ordered newest-first.
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub user_id: Option<String>,
    pub mode: Option<String>,
    pub level: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

/// Outcome of a `mark_syncing` guard attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncClaim {
    Acquired,
    Refused,
    NotFound,
}

const SESSION_COLUMNS: &str = "id, user_id, mode, level, kind, tag_ids, total_speeches, \
     correct_count, incorrect_count, started_at, completed_at, sync_status, retry_count, \
     remote_id, last_attempt_at, created_at, updated_at";

fn row_to_session(row: &Row) -> Result<PracticeSession> {
    let tag_ids: String = row.get("tag_ids")?;
    let started_at: String = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let last_attempt_at: Option<String> = row.get("last_attempt_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let sync_status: String = row.get("sync_status")?;

    Ok(PracticeSession {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        mode: row.get("mode")?,
        level: row.get("level")?,
        kind: row.get("kind")?,
        tag_ids: decode_tags(&tag_ids)?,
        results: Vec::new(),
        total_speeches: to_u32(row.get("total_speeches")?, "total_speeches")?,
        correct_count: to_u32(row.get("correct_count")?, "correct_count")?,
        incorrect_count: to_u32(row.get("incorrect_count")?, "incorrect_count")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        completed_at: parse_optional_datetime(completed_at, "completed_at")?,
        sync_status: parse_sync_status(&sync_status)?,
        retry_count: to_u32(row.get("retry_count")?, "retry_count")?,
        remote_id: row.get("remote_id")?,
        last_attempt_at: parse_optional_datetime(last_attempt_at, "last_attempt_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn load_results(conn: &Connection, session_id: &str) -> Result<Vec<SpeechResult>> {
    let mut stmt = conn.prepare(
        "SELECT correct, score, transcript
         FROM speech_results
         WHERE session_id = ?1
         ORDER BY position ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        results.push(SpeechResult {
            correct: row.get::<_, i64>(0)? != 0,
            score: row.get(1)?,
            transcript: row.get(2)?,
        });
    }

    Ok(results)
}

enum InsertOutcome {
    Inserted,
    Duplicate,
}

impl Database {
    /// Persists a new completed session with status `pending`, the session
    /// row and its per-speech results in one transaction.
    pub async fn insert_session(&self, session: &PracticeSession) -> SyncResult<()> {
        if session.completed_at.is_none() {
            return Err(SyncError::validation(
                "session must be complete before it can be saved",
            ));
        }
        if session.results.is_empty() {
            return Err(SyncError::validation("session has no speech results"));
        }

        let record = session.clone();
        let outcome = self
            .execute(move |conn| {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM sessions WHERE id = ?1",
                        params![record.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    return Ok(InsertOutcome::Duplicate);
                }

                let tx = conn.transaction()?;

                tx.execute(
                    "INSERT INTO sessions (id, user_id, mode, level, kind, tag_ids, total_speeches,
                                           correct_count, incorrect_count, started_at, completed_at,
                                           sync_status, retry_count, remote_id, last_attempt_at,
                                           created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    params![
                        record.id,
                        record.user_id,
                        record.mode,
                        record.level,
                        record.kind,
                        encode_tags(&record.tag_ids)?,
                        to_i64(record.total_speeches),
                        to_i64(record.correct_count),
                        to_i64(record.incorrect_count),
                        record.started_at.to_rfc3339(),
                        record.completed_at.as_ref().map(|dt| dt.to_rfc3339()),
                        record.sync_status.as_str(),
                        to_i64(record.retry_count),
                        record.remote_id,
                        record.last_attempt_at.as_ref().map(|dt| dt.to_rfc3339()),
                        record.created_at.to_rfc3339(),
                        record.updated_at.to_rfc3339(),
                    ],
                )?;

                for (position, result) in record.results.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO speech_results (session_id, position, correct, score, transcript)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            record.id,
                            position as i64,
                            result.correct as i64,
                            result.score,
                            result.transcript,
                        ],
                    )?;
                }

                tx.commit()?;
                Ok(InsertOutcome::Inserted)
            })
            .await
            .map_err(SyncError::Persistence)?;

        match outcome {
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::Duplicate => Err(SyncError::validation(format!(
                "session {} already exists",
                session.id
            ))),
        }
    }

    pub async fn get_session(&self, session_id: &str) -> SyncResult<Option<PracticeSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            let session = match rows.next()? {
                Some(row) => {
                    let mut session = row_to_session(row)?;
                    session.results = load_results(conn, &session.id)?;
                    Some(session)
                }
                None => None,
            };
            Ok(session)
        })
        .await
        .map_err(SyncError::Persistence)
    }

    /// Sessions still awaiting sync (`pending` or `failed`), oldest first so
    /// no record is starved, capped at `limit`.
    pub async fn list_pending(&self, limit: usize) -> SyncResult<Vec<PracticeSession>> {
        let limit = limit as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE sync_status IN ('pending', 'failed')
                 ORDER BY started_at ASC
                 LIMIT ?1"
            ))?;

            let mut rows = stmt.query(params![limit])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            for session in &mut sessions {
                session.results = load_results(conn, &session.id)?;
            }

            Ok(sessions)
        })
        .await
        .map_err(SyncError::Persistence)
    }

    /// Like `list_pending` but also surfaces records stuck in `syncing` whose
    /// last attempt predates `stale_after`, so a crashed drain never strands
    /// a record permanently.
    pub async fn list_sync_candidates(
        &self,
        now: DateTime<Utc>,
        stale_after: Duration,
        limit: usize,
    ) -> SyncResult<Vec<PracticeSession>> {
        let cutoff = (now - stale_after).to_rfc3339();
        let limit = limit as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE sync_status IN ('pending', 'failed')
                    OR (sync_status = 'syncing'
                        AND last_attempt_at IS NOT NULL
                        AND last_attempt_at < ?1)
                 ORDER BY started_at ASC
                 LIMIT ?2"
            ))?;

            let mut rows = stmt.query(params![cutoff, limit])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            for session in &mut sessions {
                session.results = load_results(conn, &session.id)?;
            }

            Ok(sessions)
        })
        .await
        .map_err(SyncError::Persistence)
    }

    /// Atomic mutual-exclusion guard: transitions `pending`/`failed` (or a
    /// stale `syncing` left behind by an abandoned drain) to `syncing` and
    /// stamps `last_attempt_at`. Exactly one of any set of concurrent callers
    /// acquires the record; the rest observe `Conflict`.
    pub async fn mark_syncing(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> SyncResult<()> {
        let session_id = session_id.to_string();
        let id_for_err = session_id.clone();
        let stamp = now.to_rfc3339();
        let cutoff = (now - stale_after).to_rfc3339();

        let claim = self
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE sessions
                     SET sync_status = 'syncing',
                         last_attempt_at = ?2,
                         updated_at = ?2
                     WHERE id = ?1
                       AND (sync_status IN ('pending', 'failed')
                            OR (sync_status = 'syncing'
                                AND last_attempt_at IS NOT NULL
                                AND last_attempt_at < ?3))",
                    params![session_id, stamp, cutoff],
                )?;

                if updated == 1 {
                    return Ok(SyncClaim::Acquired);
                }

                let status: Option<String> = conn
                    .query_row(
                        "SELECT sync_status FROM sessions WHERE id = ?1",
                        params![session_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                Ok(match status {
                    Some(_) => SyncClaim::Refused,
                    None => SyncClaim::NotFound,
                })
            })
            .await
            .map_err(SyncError::Persistence)?;

        match claim {
            SyncClaim::Acquired => Ok(()),
            SyncClaim::Refused => Err(SyncError::Conflict(id_for_err)),
            SyncClaim::NotFound => Err(SyncError::validation(format!(
                "unknown session {id_for_err}"
            ))),
        }
    }

    /// Transitions `syncing` -> `synced`, recording the server-assigned id.
    pub async fn mark_synced(
        &self,
        session_id: &str,
        remote_id: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<()> {
        let session_id = session_id.to_string();
        let id_for_err = session_id.clone();
        let remote_id = remote_id.to_string();
        let stamp = now.to_rfc3339();

        let updated = self
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE sessions
                     SET sync_status = 'synced',
                         remote_id = ?2,
                         updated_at = ?3
                     WHERE id = ?1 AND sync_status = 'syncing'",
                    params![session_id, remote_id, stamp],
                )?;
                Ok(updated)
            })
            .await
            .map_err(SyncError::Persistence)?;

        if updated == 1 {
            Ok(())
        } else {
            Err(SyncError::Conflict(id_for_err))
        }
    }

    /// Transitions `syncing` -> `failed` and increments `retry_count`.
    pub async fn mark_failed(&self, session_id: &str, now: DateTime<Utc>) -> SyncResult<()> {
        let session_id = session_id.to_string();
        let id_for_err = session_id.clone();
        let stamp = now.to_rfc3339();

        let updated = self
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE sessions
                     SET sync_status = 'failed',
                         retry_count = retry_count + 1,
                         updated_at = ?2
                     WHERE id = ?1 AND sync_status = 'syncing'",
                    params![session_id, stamp],
                )?;
                Ok(updated)
            })
            .await
            .map_err(SyncError::Persistence)?;

        if updated == 1 {
            Ok(())
        } else {
            Err(SyncError::Conflict(id_for_err))
        }
    }

    /// Transitions `syncing` back to `pending` without touching
    /// `retry_count`. Used when an attempt is abandoned for reasons that are
    /// not the record's fault (expired credentials, cancellation).
    pub async fn release_syncing(&self, session_id: &str, now: DateTime<Utc>) -> SyncResult<()> {
        let session_id = session_id.to_string();
        let id_for_err = session_id.clone();
        let stamp = now.to_rfc3339();

        let updated = self
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE sessions
                     SET sync_status = 'pending',
                         updated_at = ?2
                     WHERE id = ?1 AND sync_status = 'syncing'",
                    params![session_id, stamp],
                )?;
                Ok(updated)
            })
            .await
            .map_err(SyncError::Persistence)?;

        if updated == 1 {
            Ok(())
        } else {
            Err(SyncError::Conflict(id_for_err))
        }
    }

    /// History view: completed sessions filtered by owner, classification and
    /// date range, newest first.
    pub async fn query_sessions(&self, query: &SessionQuery) -> SyncResult<Vec<SessionSummary>> {
        let query = query.clone();
        self.execute(move |conn| {
            let mut sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE completed_at IS NOT NULL"
            );
            let mut args: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(user_id) = &query.user_id {
                sql.push_str(" AND user_id = ?");
                args.push(Box::new(user_id.clone()));
            }
            if let Some(mode) = &query.mode {
                sql.push_str(" AND mode = ?");
                args.push(Box::new(mode.clone()));
            }
            if let Some(level) = &query.level {
                sql.push_str(" AND level = ?");
                args.push(Box::new(level.clone()));
            }
            if let Some(from) = &query.from {
                sql.push_str(" AND started_at >= ?");
                args.push(Box::new(from.to_rfc3339()));
            }
            if let Some(to) = &query.to {
                sql.push_str(" AND started_at <= ?");
                args.push(Box::new(to.to_rfc3339()));
            }

            sql.push_str(" ORDER BY started_at DESC LIMIT ? OFFSET ?");
            args.push(Box::new(query.limit as i64));
            args.push(Box::new(query.offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let arg_refs: Vec<&dyn ToSql> = args.iter().map(|arg| arg.as_ref()).collect();
            let mut rows = stmt.query(arg_refs.as_slice())?;

            let mut summaries = Vec::new();
            while let Some(row) = rows.next()? {
                summaries.push(SessionSummary::from(row_to_session(row)?));
            }

            Ok(summaries)
        })
        .await
        .map_err(SyncError::Persistence)
    }

    /// Number of sessions not yet reconciled with the remote system.
    pub async fn count_unsynced(&self) -> SyncResult<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE sync_status != 'synced'",
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
        .map_err(SyncError::Persistence)
    }
}
