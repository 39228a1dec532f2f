use std::time::Duration;

/// Tunables for the sync engine and its background scheduler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Automatic retries per session before it is left `failed` for a manual
    /// trigger to pick up.
    pub max_retry_attempts: u32,

    /// Maximum sessions claimed per drain pass.
    pub batch_limit: usize,

    /// A record still `syncing` after this long is treated as abandoned and
    /// becomes claimable again.
    pub stale_syncing_after: chrono::Duration,

    /// Interval between automatic drain passes.
    pub sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 4,
            batch_limit: 20,
            stale_syncing_after: chrono::Duration::minutes(5),
            sync_interval: Duration::from_secs(60),
        }
    }
}
