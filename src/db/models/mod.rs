pub mod session;
pub mod speech;

pub use session::{NewSession, PracticeSession, SessionSummary, SyncStatus};
pub use speech::SpeechResult;
