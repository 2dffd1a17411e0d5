// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the request's authentication.
//!
//! These never look at the `Authorization` header themselves; they read the
//! [`Authentication`] the middleware placed in the request extensions.
//!
//! ```rust,ignore
//! async fn my_handler(CurrentUser(auth): CurrentUser) -> impl IntoResponse {
//!     // auth.principal is the resolved Principal
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, Authentication, Role};

/// Requires an authenticated principal (401 otherwise).
pub struct CurrentUser(pub Authentication);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authentication>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::AuthenticationRequired)
    }
}

/// Requires an authenticated admin (401 / 403 otherwise).
pub struct AdminOnly(pub Authentication);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(auth) = CurrentUser::from_request_parts(parts, state).await?;

        if !auth.principal.has_role(Role::Admin) {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts() -> Parts {
        Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn authentication(role: Role) -> Authentication {
        Authentication {
            principal: Principal {
                id: Uuid::new_v4(),
                display_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                role,
            },
            token_id: "jti-1".to_string(),
        }
    }

    #[tokio::test]
    async fn current_user_requires_authentication() {
        let mut parts = parts();
        let result = CurrentUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::AuthenticationRequired)));
    }

    #[tokio::test]
    async fn current_user_reads_extensions() {
        let mut parts = parts();
        parts.extensions.insert(authentication(Role::User));

        let CurrentUser(auth) = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(auth.principal.email, "alice@example.com");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let mut parts = parts();
        parts.extensions.insert(authentication(Role::User));

        let result = AdminOnly::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin() {
        let mut parts = parts();
        parts.extensions.insert(authentication(Role::Admin));

        assert!(AdminOnly::from_request_parts(&mut parts, &()).await.is_ok());
    }
}
