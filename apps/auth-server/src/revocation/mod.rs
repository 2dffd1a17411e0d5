// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session revocation list.
//!
//! Bearer tokens cannot be invalidated before `exp`, so logout records the
//! token here and the authentication stage consults this list before any
//! cryptographic work. Entries are keyed by the SHA-256 fingerprint of the
//! token; raw credentials are never persisted.
//!
//! ## Components
//!
//! - [`RevocationStore`] - fingerprinting facade used by request handling
//! - [`RevocationBackend`] - persistence seam (unique insert, lookup, range delete)
//! - [`RedbRevocationBackend`] - embedded redb implementation
//! - [`RevocationPurger`] - lifecycle-owned periodic cleanup

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::instrument;

mod purger;
mod redb_store;

pub use purger::{RevocationPurger, DEFAULT_PURGE_INTERVAL};
pub use redb_store::RedbRevocationBackend;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("revocation backend unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for revoked token fingerprints.
///
/// Expiry values are unix seconds.
pub trait RevocationBackend: Send + Sync {
    /// Insert unless already present. Returns `true` if a new row was written.
    fn insert(&self, fingerprint: &str, expires_at: i64) -> StoreResult<bool>;

    fn exists(&self, fingerprint: &str) -> StoreResult<bool>;

    /// Delete every entry with `expires_at < before`. Returns the count removed.
    fn delete_expired(&self, before: i64) -> StoreResult<usize>;
}

/// SHA-256 hex digest of a token, used as the revocation key.
pub fn fingerprint(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Shared handle over a revocation backend.
#[derive(Clone)]
pub struct RevocationStore {
    backend: Arc<dyn RevocationBackend>,
}

impl RevocationStore {
    pub fn new(backend: Arc<dyn RevocationBackend>) -> Self {
        Self { backend }
    }

    /// Open (or create) a file-backed store.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(RedbRevocationBackend::open(path)?)))
    }

    /// Volatile store, contents are lost on drop.
    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self::new(Arc::new(RedbRevocationBackend::in_memory()?)))
    }

    /// Record `token` as revoked until `expires_at`.
    ///
    /// Idempotent: returns `false` if the token was already revoked.
    #[instrument(level = "debug", skip_all, fields(expires_at = %expires_at), err)]
    pub fn add(&self, token: &str, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        let key = fingerprint(token);
        let inserted = self.backend.insert(&key, expires_at.timestamp())?;
        if inserted {
            tracing::debug!(
                fingerprint = %&key[..12],
                expires_at = %expires_at,
                "Token revoked"
            );
        }
        Ok(inserted)
    }

    #[instrument(level = "debug", skip_all, err)]
    pub fn contains(&self, token: &str) -> StoreResult<bool> {
        self.backend.exists(&fingerprint(token))
    }

    /// Remove every entry whose expiry is strictly before `as_of`.
    #[instrument(skip_all, fields(as_of = %as_of), err)]
    pub fn purge_expired(&self, as_of: DateTime<Utc>) -> StoreResult<usize> {
        self.backend.delete_expired(as_of.timestamp())
    }

    /// Cheap read used by health checks.
    pub fn probe(&self) -> StoreResult<()> {
        self.backend.exists("").map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Backend whose every operation fails.
    pub struct FailingBackend;

    impl RevocationBackend for FailingBackend {
        fn insert(&self, _fingerprint: &str, _expires_at: i64) -> StoreResult<bool> {
            Err(StoreError::Unavailable("insert refused".to_string()))
        }

        fn exists(&self, _fingerprint: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("lookup refused".to_string()))
        }

        fn delete_expired(&self, _before: i64) -> StoreResult<usize> {
            Err(StoreError::Unavailable("delete refused".to_string()))
        }
    }

    pub fn failing_store() -> RevocationStore {
        RevocationStore::new(Arc::new(FailingBackend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::testing::CapturedLogs;
    use chrono::Duration;

    #[test]
    fn fingerprint_is_stable_hex_digest() {
        let fp = fingerprint("abc");
        assert_eq!(
            fp,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp, fingerprint("abc"));
        assert_ne!(fp, fingerprint("abd"));
    }

    #[test]
    fn added_token_is_contained() {
        let store = RevocationStore::in_memory().unwrap();
        let exp = Utc::now() + Duration::hours(1);

        assert!(!store.contains("token-a").unwrap());
        assert!(store.add("token-a", exp).unwrap());
        assert!(store.contains("token-a").unwrap());
        assert!(!store.contains("token-b").unwrap());
    }

    #[test]
    fn add_is_idempotent() {
        let store = RevocationStore::in_memory().unwrap();
        let exp = Utc::now() + Duration::hours(1);

        assert!(store.add("token-a", exp).unwrap());
        assert!(!store.add("token-a", exp).unwrap());
        assert!(!store.add("token-a", exp + Duration::hours(1)).unwrap());
        assert!(store.contains("token-a").unwrap());
    }

    #[test]
    fn purge_removes_only_expired_entries_once() {
        let store = RevocationStore::in_memory().unwrap();
        let now = Utc::now();

        store.add("stale", now - Duration::seconds(1)).unwrap();
        store.add("fresh", now + Duration::hours(1)).unwrap();

        assert_eq!(store.purge_expired(now).unwrap(), 1);
        assert!(!store.contains("stale").unwrap());
        assert!(store.contains("fresh").unwrap());

        assert_eq!(store.purge_expired(now).unwrap(), 0);
    }

    #[test]
    fn purge_keeps_entry_expiring_exactly_at_threshold() {
        let store = RevocationStore::in_memory().unwrap();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        store.add("boundary", now).unwrap();
        assert_eq!(store.purge_expired(now).unwrap(), 0);
        assert!(store.contains("boundary").unwrap());

        assert_eq!(store.purge_expired(now + Duration::seconds(1)).unwrap(), 1);
    }

    #[test]
    fn failing_backend_surfaces_errors() {
        let store = testing::failing_store();
        assert!(store.contains("token").is_err());
        assert!(store.add("token", Utc::now()).is_err());
        assert!(store.purge_expired(Utc::now()).is_err());
        assert!(store.probe().is_err());
    }

    #[test]
    fn concurrent_adds_and_purges_lose_nothing() {
        let store = RevocationStore::in_memory().unwrap();
        let exp = Utc::now() + Duration::hours(1);
        let done = std::sync::atomic::AtomicBool::new(false);
        let shared = &store;

        std::thread::scope(|scope| {
            let purger = scope.spawn(|| {
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    store.purge_expired(Utc::now()).unwrap();
                    std::thread::yield_now();
                }
            });

            let writers: Vec<_> = (0..8)
                .map(|writer| {
                    let store = shared;
                    scope.spawn(move || {
                        for i in 0..50 {
                            let token = format!("token-{writer}-{i}");
                            assert!(store.add(&token, exp).unwrap());
                            assert!(store.contains(&token).unwrap());
                        }
                        store.add("shared", exp).unwrap();
                    })
                })
                .collect();

            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, std::sync::atomic::Ordering::Release);
            purger.join().unwrap();
        });

        for writer in 0..8 {
            for i in 0..50 {
                assert!(store.contains(&format!("token-{writer}-{i}")).unwrap());
            }
        }
        assert!(store.contains("shared").unwrap());
        assert_eq!(store.purge_expired(exp + Duration::seconds(1)).unwrap(), 401);
    }

    #[test]
    fn operations_are_traced_without_the_token() {
        let logs = CapturedLogs::default();
        let store = RevocationStore::in_memory().unwrap();

        tracing::subscriber::with_default(logs.subscriber(), || {
            store
                .add("secret-token-value", Utc::now() + Duration::hours(1))
                .unwrap();
            store.contains("secret-token-value").unwrap();
            store.purge_expired(Utc::now()).unwrap();
            testing::failing_store().add("secret-token-value", Utc::now()).ok();
        });

        let output = logs.contents();
        assert!(output.contains("purge_expired"));
        assert!(output.contains("contains"));
        assert!(output.contains("time.busy"));
        assert!(output.contains("insert refused"));
        assert!(!output.contains("secret-token-value"));
    }
}
