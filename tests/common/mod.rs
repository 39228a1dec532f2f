#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::sync::Mutex;

use parlo_sync::{
    Connectivity, Database, NewSession, PracticeSession, RemoteAck, RemoteError, SessionUplink,
    SpeechPrompt, SpeechResult,
};

pub struct TestDb {
    // Held so the directory outlives the database handle.
    _dir: TempDir,
    pub db: Database,
}

pub fn open_db() -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("sessions.db")).expect("open database");
    TestDb { _dir: dir, db }
}

pub fn new_session(id: &str, started_at: DateTime<Utc>) -> NewSession {
    let results = vec![
        SpeechResult::correct_with_score(0.92),
        SpeechResult::correct_with_score(0.85),
        SpeechResult::incorrect(),
    ];

    NewSession {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        mode: "speaking".to_string(),
        level: "b1".to_string(),
        kind: "daily".to_string(),
        tag_ids: vec!["travel".to_string()],
        total_speeches: 3,
        correct_count: 2,
        incorrect_count: 1,
        results,
        started_at,
        completed_at: Some(started_at + Duration::minutes(5)),
    }
}

pub fn pending_record(id: &str, started_at: DateTime<Utc>) -> PracticeSession {
    new_session(id, started_at).into_record(Utc::now())
}

/// Connectivity stub with a settable reachability flag.
pub struct StaticConnectivity {
    state_tx: watch::Sender<bool>,
}

impl StaticConnectivity {
    pub fn new(reachable: bool) -> Arc<Self> {
        let (state_tx, _) = watch::channel(reachable);
        Arc::new(Self { state_tx })
    }

    pub fn set_reachable(&self, reachable: bool) {
        let _ = self.state_tx.send(reachable);
    }
}

#[async_trait]
impl Connectivity for StaticConnectivity {
    async fn is_reachable(&self) -> bool {
        *self.state_tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum UplinkOutcome {
    Succeed,
    Transient,
    Reject,
    AuthExpired,
}

/// Scriptable uplink: per-session outcomes, defaulting to success. Records
/// every push so tests can assert on call counts and ordering.
pub struct MockUplink {
    outcomes: Mutex<HashMap<String, UplinkOutcome>>,
    pushed: Mutex<Vec<String>>,
    speech_calls: Mutex<u32>,
}

impl MockUplink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(HashMap::new()),
            pushed: Mutex::new(Vec::new()),
            speech_calls: Mutex::new(0),
        })
    }

    pub async fn set_outcome(&self, session_id: &str, outcome: UplinkOutcome) {
        self.outcomes
            .lock()
            .await
            .insert(session_id.to_string(), outcome);
    }

    pub async fn pushed_ids(&self) -> Vec<String> {
        self.pushed.lock().await.clone()
    }

    pub async fn speech_call_count(&self) -> u32 {
        *self.speech_calls.lock().await
    }
}

#[async_trait]
impl SessionUplink for MockUplink {
    async fn push_session(&self, session: &PracticeSession) -> Result<RemoteAck, RemoteError> {
        self.pushed.lock().await.push(session.id.clone());

        let outcome = self
            .outcomes
            .lock()
            .await
            .get(&session.id)
            .copied()
            .unwrap_or(UplinkOutcome::Succeed);

        match outcome {
            UplinkOutcome::Succeed => Ok(RemoteAck {
                remote_id: format!("remote-{}", session.id),
            }),
            UplinkOutcome::Transient => Err(RemoteError::Transient("503".to_string())),
            UplinkOutcome::Reject => Err(RemoteError::Rejected("bad payload".to_string())),
            UplinkOutcome::AuthExpired => Err(RemoteError::AuthExpired),
        }
    }

    async fn fetch_speeches(&self, count: u32) -> Result<Vec<SpeechPrompt>, RemoteError> {
        *self.speech_calls.lock().await += 1;

        Ok((0..count)
            .map(|i| SpeechPrompt {
                id: format!("speech-{i}"),
                text: "Wie komme ich zum Bahnhof?".to_string(),
                level: "b1".to_string(),
                tag_ids: vec!["travel".to_string()],
            })
            .collect())
    }
}
