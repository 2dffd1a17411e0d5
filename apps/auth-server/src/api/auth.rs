// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{dummy_hash, hash_password, verify_password},
        CurrentUser, Role, SessionError,
    },
    diagnostics::RequestContext,
    directory::{DirectoryError, UserRecord},
    error::ApiError,
    models::{
        LoginRequest, LoginResponse, LogoutResponse, MeResponse, MessageResponse, RegisterRequest,
    },
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const EMAIL_TAKEN: &str = "Email already exists";

/// Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = MessageResponse),
        (status = 500, description = "Token could not be issued", body = MessageResponse)
    )
)]
#[instrument(skip_all, fields(client_ip = %ctx.client_ip))]
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let record = state.directory.find_by_email(&request.email).map_err(|e| {
        error!(error = %e, "Login failed: directory lookup error");
        ApiError::internal("Login failed")
    })?;

    // Unknown emails still pay for one Argon2 verification
    let hash = match &record {
        Some(record) => record.password_hash.clone(),
        None => dummy_hash().to_string(),
    };
    let verified = check_password(request.password, hash, "Login failed").await?;

    let Some(record) = record else {
        info!(email = %request.email, "Login failed: unknown email");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    match verified {
        Ok(true) => {}
        Ok(false) => {
            info!(email = %record.email, "Login failed: wrong password");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
        Err(e) => {
            warn!(email = %record.email, error = %e, "Stored password hash is unreadable");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
    }

    let response = issue_session(&state, record, "Login failed")?;
    info!(user_id = %response.id, "Login succeeded");
    Ok(Json(response))
}

/// Create an account and sign it in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = LoginResponse),
        (status = 400, description = "Email taken or a field is blank", body = MessageResponse),
        (status = 500, description = "Account could not be created", body = MessageResponse)
    )
)]
#[instrument(skip_all, fields(client_ip = %ctx.client_ip))]
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let name = request.name.trim();
    let email = request.email.trim();
    if name.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Name, email and password are required"));
    }

    match state.directory.find_by_email(email) {
        Ok(None) => {}
        Ok(Some(_)) => {
            warn!(%email, "Registration failed: email already exists");
            return Err(ApiError::bad_request(EMAIL_TAKEN));
        }
        Err(e) => {
            error!(error = %e, "Registration failed: directory lookup error");
            return Err(ApiError::internal("Registration failed"));
        }
    }

    // Nothing is stored unless a token can be returned for it
    if !state.codec.can_sign() {
        error!("Registration failed: token signing is disabled");
        return Err(ApiError::internal("Registration failed"));
    }

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!(error = %e, "Password hashing task failed");
            ApiError::internal("Registration failed")
        })?
        .map_err(|e| {
            error!(error = %e, "Password hashing failed");
            ApiError::internal("Registration failed")
        })?;

    let record = UserRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash,
        role: Role::User,
    };

    match state.directory.insert(record.clone()) {
        Ok(()) => {}
        Err(DirectoryError::Duplicate(_)) => {
            warn!(%email, "Registration failed: email already exists");
            return Err(ApiError::bad_request(EMAIL_TAKEN));
        }
        Err(e) => {
            error!(error = %e, "Registration failed: directory write error");
            return Err(ApiError::internal("Registration failed"));
        }
    }

    let response = issue_session(&state, record, "Registration failed")?;
    info!(user_id = %response.id, "Registration succeeded");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Revoke the presented bearer token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token revoked", body = LogoutResponse),
        (status = 400, description = "Bad header or malformed token", body = MessageResponse),
        (status = 401, description = "Token was already invalidated", body = MessageResponse)
    )
)]
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    match state.sessions.terminate(authorization) {
        Ok(_) => Ok(Json(LogoutResponse {
            message: "Logged out successfully".to_string(),
            success: true,
        })),
        Err(SessionError::InvalidHeader) => {
            Err(ApiError::bad_request("Invalid authorization header"))
        }
        Err(SessionError::MalformedToken) => {
            Err(ApiError::bad_request("Logout failed: token is malformed"))
        }
    }
}

/// Current principal.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Authenticated principal", body = MeResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.principal.id))]
pub async fn me(CurrentUser(auth): CurrentUser) -> Json<MeResponse> {
    let principal = auth.principal;
    Json(MeResponse {
        id: principal.id,
        name: principal.display_name,
        email: principal.email,
        role: principal.role,
    })
}

/// Verify off the async workers; Argon2 is CPU-bound.
async fn check_password(
    password: String,
    hash: String,
    failure: &'static str,
) -> Result<Result<bool, argon2::password_hash::Error>, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            error!(error = %e, "Password verification task failed");
            ApiError::internal(failure)
        })
}

fn issue_session(
    state: &AppState,
    record: UserRecord,
    failure: &'static str,
) -> Result<LoginResponse, ApiError> {
    let mut claims = BTreeMap::new();
    claims.insert("role".to_string(), record.role.to_string());
    claims.insert("name".to_string(), record.name.clone());

    let token = state
        .codec
        .issue(&record.email, claims, state.token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to issue token");
            ApiError::internal(failure)
        })?;

    Ok(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        id: record.id,
        name: record.name,
        email: record.email,
        role: record.role,
    })
}
