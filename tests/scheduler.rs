mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use common::{open_db, pending_record, MockUplink, StaticConnectivity};
use parlo_sync::{Connectivity, SessionUplink, SyncConfig, SyncEngine, SyncScheduler, SyncStatus};

#[tokio::test]
async fn regained_connectivity_drains_pending_sessions() {
    let handle = open_db();

    let connectivity = StaticConnectivity::new(false);
    let uplink = MockUplink::new();

    // Interval far in the future so only the reachability transition can
    // trigger a drain after the startup tick.
    let config = SyncConfig {
        sync_interval: StdDuration::from_secs(3_600),
        ..SyncConfig::default()
    };
    let engine = Arc::new(SyncEngine::new(
        handle.db.clone(),
        connectivity.clone() as Arc<dyn Connectivity>,
        uplink.clone() as Arc<dyn SessionUplink>,
        config,
    ));

    let mut scheduler = SyncScheduler::new();
    scheduler
        .start(engine.clone(), connectivity.subscribe())
        .unwrap();

    // Give the startup tick a moment to no-op against the offline observer.
    tokio::time::sleep(StdDuration::from_millis(50)).await;

    handle
        .db
        .insert_session(&pending_record("s-1", Utc::now() - Duration::minutes(5)))
        .await
        .unwrap();

    connectivity.set_reachable(true);

    let mut synced = false;
    for _ in 0..100 {
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        let session = handle.db.get_session("s-1").await.unwrap().unwrap();
        if session.sync_status == SyncStatus::Synced {
            synced = true;
            break;
        }
    }
    assert!(synced, "scheduler should drain on connectivity regained");

    scheduler.stop().await.unwrap();
}
