// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{
    Authenticator, InvalidTokenPolicy, PrincipalResolver, SessionTerminator, TokenCodec,
};
use crate::config::DEFAULT_TOKEN_TTL;
use crate::directory::UserDirectory;
use crate::revocation::RevocationStore;

#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub revocations: RevocationStore,
    pub directory: Arc<dyn UserDirectory>,
    pub authenticator: Arc<Authenticator>,
    pub sessions: SessionTerminator,
    pub token_ttl: Duration,
}

impl AppState {
    pub fn new(
        codec: TokenCodec,
        revocations: RevocationStore,
        directory: Arc<dyn UserDirectory>,
        policy: InvalidTokenPolicy,
    ) -> Self {
        let codec = Arc::new(codec);
        let principals = PrincipalResolver::new(directory.clone());
        let authenticator =
            Authenticator::new(codec.clone(), revocations.clone(), principals, policy);
        let sessions = SessionTerminator::new(codec.clone(), revocations.clone());

        Self {
            codec,
            revocations,
            directory,
            authenticator: Arc::new(authenticator),
            sessions,
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}
