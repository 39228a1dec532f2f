use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::Connectivity;

const PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Polls a backend health endpoint and publishes reachability transitions on
/// a watch channel. The monitor assumes unreachable until the first probe
/// succeeds.
pub struct NetworkMonitor {
    client: Client,
    probe_url: String,
    probe_interval: Duration,
    state_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl NetworkMonitor {
    pub fn new(probe_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .context("failed to build reachability probe client")?;

        let (state_tx, _) = watch::channel(false);

        Ok(Self {
            client,
            probe_url: probe_url.into(),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            state_tx,
            handle: None,
            cancel_token: None,
        })
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            bail!("network monitor already running");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let client = self.client.clone();
        let probe_url = self.probe_url.clone();
        let interval = self.probe_interval;
        let state_tx = self.state_tx.clone();

        let handle = tokio::spawn(probe_loop(client, probe_url, interval, state_tx, token_clone));

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
                .context("reachability probe task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connectivity for NetworkMonitor {
    async fn is_reachable(&self) -> bool {
        *self.state_tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }
}

async fn probe_loop(
    client: Client,
    probe_url: String,
    interval: Duration,
    state_tx: watch::Sender<bool>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reachable = probe_once(&client, &probe_url).await;
                let previous = *state_tx.borrow();
                if reachable != previous {
                    info!("Reachability changed: {previous} -> {reachable}");
                    let _ = state_tx.send(reachable);
                } else {
                    debug!("Reachability unchanged ({reachable})");
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Reachability probe shutting down");
                break;
            }
        }
    }
}

async fn probe_once(client: &Client, probe_url: &str) -> bool {
    match client.head(probe_url).send().await {
        Ok(response) => response.status().is_success(),
        Err(err) => {
            warn!("Reachability probe failed: {err}");
            false
        }
    }
}
