//! Offline-first practice session storage and sync core for the Parlo
//! client.
//!
//! Completed sessions are persisted locally first and reconciled with the
//! backend when connectivity allows, with at-most-once delivery per session
//! and idempotent retry. The host application wires the pieces explicitly:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parlo_sync::{
//!     Connectivity, Database, HttpSessionUplink, NetworkMonitor, SessionService, SyncConfig,
//!     SyncEngine, SyncScheduler,
//! };
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let db = Database::new("parlo/sessions.db".into())?;
//!
//! let mut monitor = NetworkMonitor::new("https://api.parlo.app/health")?;
//! monitor.start()?;
//! let reachability = monitor.subscribe();
//! let connectivity = Arc::new(monitor);
//!
//! let uplink = Arc::new(HttpSessionUplink::new("https://api.parlo.app", None)?);
//!
//! let engine = Arc::new(SyncEngine::new(
//!     db.clone(),
//!     connectivity.clone(),
//!     uplink.clone(),
//!     SyncConfig::default(),
//! ));
//!
//! let mut scheduler = SyncScheduler::new();
//! scheduler.start(engine.clone(), reachability)?;
//!
//! let sessions = SessionService::new(db, engine, connectivity, uplink);
//! # Ok(())
//! # }
//! ```

pub mod connectivity;
pub mod db;
pub mod error;
pub mod remote;
pub mod service;
pub mod sync;

pub use connectivity::{Connectivity, NetworkMonitor};
pub use db::{
    Database, NewSession, PracticeSession, SessionQuery, SessionSummary, SpeechResult, SyncStatus,
};
pub use error::{SyncError, SyncResult};
pub use remote::{HttpSessionUplink, RemoteAck, RemoteError, SessionUplink, SpeechPrompt};
pub use service::SessionService;
pub use sync::{DrainReport, SyncConfig, SyncEngine, SyncScheduler, SyncTrigger};
