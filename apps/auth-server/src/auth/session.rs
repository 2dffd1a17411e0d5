// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session termination (logout).
//!
//! Logout revokes the single token presented in the `Authorization` header
//! until its own expiry. The signature is not checked here: anyone holding a
//! token may revoke it, and a forged token only adds an entry that the
//! purger later removes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn, Level};

use super::{bearer_from_header, TokenCodec};
use crate::revocation::RevocationStore;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid authorization header")]
    InvalidHeader,

    #[error("token is malformed")]
    MalformedToken,
}

/// Acknowledgement returned to the logout handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub subject: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// `false` when the token had already been revoked.
    pub newly_revoked: bool,
    /// `false` when the revocation write failed and was swallowed.
    pub persisted: bool,
}

#[derive(Clone)]
pub struct SessionTerminator {
    codec: Arc<TokenCodec>,
    revocations: RevocationStore,
}

impl SessionTerminator {
    pub fn new(codec: Arc<TokenCodec>, revocations: RevocationStore) -> Self {
        Self { codec, revocations }
    }

    /// Revoke the bearer token carried by `authorization`.
    ///
    /// A failed store write is logged and reported as success with
    /// `persisted: false`; the caller still acknowledges the logout.
    #[instrument(skip_all, err(level = Level::INFO))]
    pub fn terminate(&self, authorization: Option<&str>) -> Result<LogoutOutcome, SessionError> {
        let token = authorization
            .and_then(bearer_from_header)
            .ok_or(SessionError::InvalidHeader)?;

        let expires_at = self
            .codec
            .extract_expiry(token)
            .map_err(|_| SessionError::MalformedToken)?;
        let subject = self.codec.extract_subject(token).ok();

        let (newly_revoked, persisted) = match self.revocations.add(token, expires_at) {
            Ok(inserted) => (inserted, true),
            Err(e) => {
                warn!(error = %e, "Failed to persist token revocation");
                (false, false)
            }
        };

        info!(
            subject = subject.as_deref().unwrap_or("unknown"),
            expires_at = %expires_at,
            newly_revoked,
            persisted,
            "Session terminated"
        );

        Ok(LogoutOutcome {
            subject,
            expires_at,
            newly_revoked,
            persisted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::testing::CapturedLogs;
    use crate::revocation::testing::failing_store;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const SECRET: &[u8] = b"session-test-secret";

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(SECRET))
    }

    fn token(codec: &TokenCodec) -> String {
        codec
            .issue("alice@example.com", BTreeMap::new(), Duration::from_secs(3600))
            .unwrap()
    }

    #[test]
    fn terminate_revokes_presented_token() {
        let codec = codec();
        let store = RevocationStore::in_memory().unwrap();
        let terminator = SessionTerminator::new(codec.clone(), store.clone());
        let token = token(&codec);

        let outcome = terminator
            .terminate(Some(&format!("Bearer {token}")))
            .unwrap();

        assert_eq!(outcome.subject.as_deref(), Some("alice@example.com"));
        assert_eq!(outcome.expires_at, codec.extract_expiry(&token).unwrap());
        assert!(outcome.newly_revoked);
        assert!(outcome.persisted);
        assert!(store.contains(&token).unwrap());
    }

    #[test]
    fn second_logout_is_idempotent() {
        let codec = codec();
        let store = RevocationStore::in_memory().unwrap();
        let terminator = SessionTerminator::new(codec.clone(), store);
        let header = format!("Bearer {}", token(&codec));

        assert!(terminator.terminate(Some(&header)).unwrap().newly_revoked);
        let again = terminator.terminate(Some(&header)).unwrap();
        assert!(!again.newly_revoked);
        assert!(again.persisted);
    }

    #[test]
    fn missing_or_non_bearer_header_is_invalid() {
        let terminator = SessionTerminator::new(codec(), RevocationStore::in_memory().unwrap());

        assert_eq!(terminator.terminate(None), Err(SessionError::InvalidHeader));
        assert_eq!(
            terminator.terminate(Some("Basic dXNlcjpwdw==")),
            Err(SessionError::InvalidHeader)
        );
        assert_eq!(
            terminator.terminate(Some("Bearer   ")),
            Err(SessionError::InvalidHeader)
        );
    }

    #[test]
    fn garbage_token_is_malformed() {
        let terminator = SessionTerminator::new(codec(), RevocationStore::in_memory().unwrap());
        assert_eq!(
            terminator.terminate(Some("Bearer not.a.jwt")),
            Err(SessionError::MalformedToken)
        );
    }

    #[test]
    fn store_failure_still_acknowledges_logout() {
        let codec = codec();
        let terminator = SessionTerminator::new(codec.clone(), failing_store());

        let outcome = terminator
            .terminate(Some(&format!("Bearer {}", token(&codec))))
            .unwrap();
        assert!(!outcome.persisted);
        assert!(!outcome.newly_revoked);
    }

    #[test]
    fn terminate_is_traced_without_the_token() {
        let logs = CapturedLogs::default();
        let codec = codec();
        let store = RevocationStore::in_memory().unwrap();
        let terminator = SessionTerminator::new(codec.clone(), store);
        let token = token(&codec);

        tracing::subscriber::with_default(logs.subscriber(), || {
            terminator.terminate(Some(&format!("Bearer {token}"))).unwrap();
            terminator.terminate(Some("Basic dXNlcjpwdw==")).unwrap_err();
        });

        let output = logs.contents();
        assert!(output.contains("terminate"));
        assert!(output.contains("Session terminated"));
        assert!(output.contains("time.busy"));
        assert!(output.contains("Invalid authorization header"));
        assert!(!output.contains(&token));
    }
}
