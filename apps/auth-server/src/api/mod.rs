// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{authenticate, Role},
    diagnostics::{self, request_id_header, ShortRequestId},
    models::{
        LoginRequest, LoginResponse, LogoutResponse, MeResponse, MessageResponse, RegisterRequest,
    },
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod health;

/// Build the application router.
///
/// Request pipeline, outermost first:
/// CORS, request id, id propagation, trace span, request context,
/// authentication, handler.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/admin/ping", get(admin::ping));

    let pipeline = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id_header(), ShortRequestId))
        .layer(PropagateRequestIdLayer::new(request_id_header()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(diagnostics::make_request_span)
                .on_request(diagnostics::on_request)
                .on_response(diagnostics::on_response)
                .on_failure(diagnostics::on_failure),
        )
        .layer(from_fn(diagnostics::attach_request_context))
        .layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(pipeline)
        .layer(CorsLayer::permissive())
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::register,
        auth::logout,
        auth::me,
        admin::ping,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            LoginRequest,
            RegisterRequest,
            LoginResponse,
            LogoutResponse,
            MeResponse,
            MessageResponse,
            Role,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Auth", description = "Registration, login, logout and session lookup"),
        (name = "Admin", description = "Admin-only endpoints"),
        (name = "Health", description = "Liveness and readiness")
    )
)]
struct ApiDoc;
