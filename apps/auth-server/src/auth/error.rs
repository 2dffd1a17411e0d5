// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Rejections emitted by the authentication stage and the auth extractors.
///
/// Token validation failures are deliberately collapsed into `InvalidToken`
/// so callers cannot tell an expired token from a forged one. Revocation is
/// the one outcome reported distinctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token was explicitly terminated by logout
    Revoked,
    /// Token failed validation (only under the reject policy)
    InvalidToken,
    /// Handler requires an authenticated principal
    AuthenticationRequired,
    /// Principal lacks the required role
    InsufficientPermissions,
}

#[derive(Serialize)]
struct AuthErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
}

impl AuthError {
    /// Get the error code for this error.
    ///
    /// Revocation answers carry the message alone.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            AuthError::Revoked => None,
            AuthError::InvalidToken => Some("invalid_token"),
            AuthError::AuthenticationRequired => Some("authentication_required"),
            AuthError::InsufficientPermissions => Some("insufficient_permissions"),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Revoked | AuthError::InvalidToken | AuthError::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Revoked => write!(f, "Token has been invalidated. Please login again."),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::AuthenticationRequired => write!(f, "Authentication required"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            message: self.to_string(),
            error_code: self.error_code(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn revoked_returns_401_with_invalidation_message() {
        let response = AuthError::Revoked.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "message": "Token has been invalidated. Please login again." })
        );
    }

    #[tokio::test]
    async fn invalid_token_hides_reason() {
        let response = AuthError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["message"], "Invalid or expired token");
        assert_eq!(body["error_code"], "invalid_token");
    }

    #[tokio::test]
    async fn insufficient_permissions_returns_403() {
        let response = AuthError::InsufficientPermissions.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
