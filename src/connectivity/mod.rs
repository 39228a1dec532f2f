pub mod monitor;

pub use monitor::NetworkMonitor;

use async_trait::async_trait;
use tokio::sync::watch;

/// Best-effort reachability of the remote system.
///
/// A transient false negative only delays a sync attempt; it never corrupts
/// state. Implementations must be cheap to query.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_reachable(&self) -> bool;

    /// Stream of reachability transitions. Receivers see the latest value on
    /// subscription and a change notification on every transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}
