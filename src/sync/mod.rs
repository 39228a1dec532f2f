pub mod backoff;
pub mod config;
pub mod engine;
pub mod worker;

pub use config::SyncConfig;
pub use engine::{DrainReport, SyncEngine, SyncTrigger};
pub use worker::SyncScheduler;
