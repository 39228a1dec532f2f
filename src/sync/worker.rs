use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::engine::{SyncEngine, SyncTrigger};

/// Owns the background drain loop: an interval tick plus a drain whenever
/// reachability transitions back to reachable.
pub struct SyncScheduler {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        engine: Arc<SyncEngine>,
        reachability: watch::Receiver<bool>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("sync scheduler already running");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(sync_loop(engine, reachability, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sync loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn sync_loop(
    engine: Arc<SyncEngine>,
    mut reachability: watch::Receiver<bool>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(engine.config().sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut watch_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_drain(&engine, SyncTrigger::Interval).await;
            }
            changed = reachability.changed(), if watch_open => {
                match changed {
                    Ok(()) => {
                        if *reachability.borrow_and_update() {
                            info!("Connectivity regained, draining pending sessions");
                            run_drain(&engine, SyncTrigger::ConnectivityRegained).await;
                        }
                    }
                    Err(_) => {
                        // Monitor gone; interval drains keep the queue moving.
                        watch_open = false;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Sync loop shutting down");
                break;
            }
        }
    }
}

async fn run_drain(engine: &SyncEngine, trigger: SyncTrigger) {
    if let Err(err) = engine.drain(trigger).await {
        error!("Drain failed: {err}");
    }
}
