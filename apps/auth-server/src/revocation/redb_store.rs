// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Revocation list backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `revoked_tokens`: fingerprint → expires_at (unix seconds)
//! - `revocation_expiry_index`: composite key (expires_at_be|fingerprint) → fingerprint
//!
//! Read transactions are MVCC snapshots, so lookups on the request path are
//! never blocked by a purge holding the write transaction.

use std::path::Path;

use redb::{backends::InMemoryBackend, Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{RevocationBackend, StoreResult};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: fingerprint → expires_at.
const REVOKED_TOKENS: TableDefinition<&str, i64> = TableDefinition::new("revoked_tokens");

/// Index: composite key → fingerprint.
/// Key format: `expires_at_be|fingerprint` for ascending-expiry range scans.
const EXPIRY_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("revocation_expiry_index");

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Order-preserving big-endian encoding of a signed timestamp.
///
/// Flipping the sign bit makes negative values sort before positive ones.
fn expiry_prefix(expires_at: i64) -> [u8; 8] {
    ((expires_at as u64) ^ (1 << 63)).to_be_bytes()
}

fn make_index_key(expires_at: i64, fingerprint: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + fingerprint.len());
    key.extend_from_slice(&expiry_prefix(expires_at));
    key.extend_from_slice(fingerprint.as_bytes());
    key
}

// =============================================================================
// RedbRevocationBackend
// =============================================================================

pub struct RedbRevocationBackend {
    db: Database,
}

impl RedbRevocationBackend {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(
                    path = %parent.display(),
                    error = %e,
                    "Could not create revocation db directory"
                );
            }
        }
        Self::init(Database::create(path)?)
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Database::builder().create_with_backend(InMemoryBackend::new())?)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Pre-create tables so read transactions never see a missing table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(REVOKED_TOKENS)?;
            let _ = write_txn.open_table(EXPIRY_INDEX)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }
}

impl RevocationBackend for RedbRevocationBackend {
    fn insert(&self, fingerprint: &str, expires_at: i64) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut revoked = write_txn.open_table(REVOKED_TOKENS)?;
            if revoked.get(fingerprint)?.is_some() {
                false
            } else {
                revoked.insert(fingerprint, expires_at)?;
                let mut index = write_txn.open_table(EXPIRY_INDEX)?;
                let key = make_index_key(expires_at, fingerprint);
                index.insert(key.as_slice(), fingerprint)?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    fn exists(&self, fingerprint: &str) -> StoreResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REVOKED_TOKENS)?;
        Ok(table.get(fingerprint)?.is_some())
    }

    fn delete_expired(&self, before: i64) -> StoreResult<usize> {
        let upper = expiry_prefix(before);

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut index = write_txn.open_table(EXPIRY_INDEX)?;
            let mut revoked = write_txn.open_table(REVOKED_TOKENS)?;

            // Any key with this exact prefix sorts after `upper`, so the scan is strict.
            let mut expired: Vec<(Vec<u8>, String)> = Vec::new();
            for entry in index.range(..upper.as_slice())? {
                let (key, fingerprint) = entry?;
                expired.push((key.value().to_vec(), fingerprint.value().to_string()));
            }

            for (key, fingerprint) in &expired {
                index.remove(key.as_slice())?;
                revoked.remove(fingerprint.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
