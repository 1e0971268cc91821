use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::session::SessionStore;
use crate::store::Store;

/// Background task that periodically drops expired sessions.
pub async fn run_session_reaper(sessions: Arc<SessionStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let removed = sessions.sweep_expired();
        if removed > 0 {
            info!("reaped {removed} expired sessions");
        }
    }
}

/// Background task that compacts the WAL once enough appends have piled up.
pub async fn run_compactor(store: Arc<Store>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = store.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => tracing::error!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_reaper_sweeps_on_tick() {
        let sessions = Arc::new(SessionStore::new(Duration::ZERO));
        sessions.load_or_create(None).unwrap();
        assert_eq!(sessions.len(), 1);

        let task = tokio::spawn(run_session_reaper(sessions.clone(), Duration::from_secs(30)));
        // First tick fires immediately
        for _ in 0..100 {
            if sessions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(sessions.is_empty());
        task.abort();
    }
}
