mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{NewSession, PracticeSession, SessionSummary, SpeechResult, SyncStatus};
pub use repositories::sessions::SessionQuery;
