// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request authentication stage.
//!
//! Runs once per request, in order:
//!
//! 1. No `Authorization: Bearer <token>` header: continue unauthenticated.
//! 2. Token on the revocation list: reject with 401 before any crypto work.
//! 3. Token fails validation: continue unauthenticated, or reject under
//!    [`InvalidTokenPolicy::Reject`].
//! 4. Subject does not resolve: continue unauthenticated.
//! 5. Otherwise insert an [`Authentication`] into the request extensions.
//!
//! A revocation lookup failure never admits the token. The stage keeps no
//! state between requests.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, field, warn, Span};

use super::{
    AuthError, Authentication, PrincipalError, PrincipalResolver, TokenCodec, TokenValidation,
};
use crate::revocation::RevocationStore;
use crate::state::AppState;

/// What to do with a bearer token that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidTokenPolicy {
    /// Continue without authentication; protected handlers answer 401.
    #[default]
    FallThrough,
    /// Answer 401 immediately.
    Reject,
}

impl InvalidTokenPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fall_through" | "fallthrough" => Some(Self::FallThrough),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Result of running the authentication stage on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Anonymous,
    Authenticated(Authentication),
    Rejected(AuthError),
}

/// Extract the token from an `Authorization` header value.
///
/// Only the `Bearer ` scheme is recognized; an empty token counts as absent.
pub fn bearer_from_header(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_from_header)
}

pub struct Authenticator {
    codec: Arc<TokenCodec>,
    revocations: RevocationStore,
    principals: PrincipalResolver,
    policy: InvalidTokenPolicy,
}

impl Authenticator {
    pub fn new(
        codec: Arc<TokenCodec>,
        revocations: RevocationStore,
        principals: PrincipalResolver,
        policy: InvalidTokenPolicy,
    ) -> Self {
        Self {
            codec,
            revocations,
            principals,
            policy,
        }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        match bearer_token(headers) {
            Some(token) => self.authenticate_token(token),
            None => AuthOutcome::Anonymous,
        }
    }

    pub fn authenticate_token(&self, token: &str) -> AuthOutcome {
        match self.revocations.contains(token) {
            Ok(true) => {
                debug!("Rejected revoked token");
                return AuthOutcome::Rejected(AuthError::Revoked);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Revocation lookup failed, continuing unauthenticated");
                return AuthOutcome::Anonymous;
            }
        }

        let verified = match self.codec.validate(token, None) {
            TokenValidation::Valid(verified) => verified,
            TokenValidation::Invalid(reason) => {
                debug!(%reason, "Bearer token failed validation");
                return match self.policy {
                    InvalidTokenPolicy::FallThrough => AuthOutcome::Anonymous,
                    InvalidTokenPolicy::Reject => AuthOutcome::Rejected(AuthError::InvalidToken),
                };
            }
        };

        match self.principals.resolve(&verified.subject) {
            Ok(principal) => AuthOutcome::Authenticated(Authentication {
                principal,
                token_id: verified.token_id,
            }),
            Err(PrincipalError::NotFound) => {
                debug!(subject = %verified.subject, "Token subject not in directory");
                AuthOutcome::Anonymous
            }
            Err(e) => {
                warn!(error = %e, "Principal lookup failed, continuing unauthenticated");
                AuthOutcome::Anonymous
            }
        }
    }
}

/// Axum middleware running [`Authenticator`] for every request.
///
/// ```rust,ignore
/// router.layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
/// ```
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // An earlier stage already authenticated this request
    if request.extensions().get::<Authentication>().is_some() {
        return next.run(request).await;
    }

    match state.authenticator.authenticate(request.headers()) {
        AuthOutcome::Authenticated(authentication) => {
            Span::current().record("user_id", field::display(&authentication.principal.email));
            request.extensions_mut().insert(authentication);
            next.run(request).await
        }
        AuthOutcome::Rejected(error) => error.into_response(),
        AuthOutcome::Anonymous => next.run(request).await,
    }
}
