// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Revocation Purger
//!
//! Background task that deletes revocation entries whose token has expired
//! on its own. Once `exp` has passed the codec rejects the token anyway, so
//! keeping the entry only grows the table.
//!
//! ## Strategy
//!
//! A sweep runs at startup and then every `interval` (default one hour).
//! Each sweep executes on the blocking pool since redb commits fsync.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; `main` cancels it after the
//! HTTP server drains and awaits the task handle.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RevocationStore;

/// Default interval between purge sweeps.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_millis(3_600_000);

pub struct RevocationPurger {
    store: RevocationStore,
    interval: Duration,
}

impl RevocationPurger {
    pub fn new(store: RevocationStore) -> Self {
        Self {
            store,
            interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run sweeps until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// let handle = tokio::spawn(purger.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Revocation purger starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Revocation purger shutting down");
                return;
            }

            self.sweep().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Revocation purger shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep. Returns the number of entries removed.
    pub async fn sweep(&self) -> usize {
        let store = self.store.clone();
        let as_of = Utc::now();

        match tokio::task::spawn_blocking(move || store.purge_expired(as_of)).await {
            Ok(Ok(0)) => {
                debug!("Revocation purger: nothing to remove");
                0
            }
            Ok(Ok(removed)) => {
                info!(removed, as_of = %as_of, "Revocation purger: removed expired entries");
                removed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Revocation purger: sweep failed");
                0
            }
            Err(e) => {
                warn!(error = %e, "Revocation purger: sweep task aborted");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revocation::testing::failing_store;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn sweep_removes_expired_entries() {
        let store = RevocationStore::in_memory().unwrap();
        store
            .add("stale", Utc::now() - ChronoDuration::seconds(1))
            .unwrap();
        store
            .add("fresh", Utc::now() + ChronoDuration::hours(1))
            .unwrap();

        let purger = RevocationPurger::new(store.clone());
        assert_eq!(purger.sweep().await, 1);
        assert_eq!(purger.sweep().await, 0);
        assert!(store.contains("fresh").unwrap());
    }

    #[tokio::test]
    async fn sweep_failure_is_logged_not_raised() {
        let purger = RevocationPurger::new(failing_store());
        assert_eq!(purger.sweep().await, 0);
    }

    #[tokio::test]
    async fn run_sweeps_on_start_and_stops_on_cancel() {
        let store = RevocationStore::in_memory().unwrap();
        store
            .add("stale", Utc::now() - ChronoDuration::seconds(1))
            .unwrap();

        let shutdown = CancellationToken::new();
        let purger = RevocationPurger::new(store.clone()).with_interval(Duration::from_secs(3600));
        let handle = tokio::spawn(purger.run(shutdown.clone()));

        // Initial sweep runs before the first sleep
        for _ in 0..100 {
            if !store.contains("stale").unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!store.contains("stale").unwrap());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("purger did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_immediately() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let purger = RevocationPurger::new(RevocationStore::in_memory().unwrap());
        tokio::time::timeout(Duration::from_secs(5), purger.run(shutdown))
            .await
            .expect("purger did not stop");
    }
}
