// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;

use crate::{auth::AdminOnly, models::MessageResponse};

/// Admin-only ping.
#[utoipa::path(
    get,
    path = "/api/admin/ping",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller is an admin", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 403, description = "Caller is not an admin", body = MessageResponse)
    )
)]
pub async fn ping(AdminOnly(auth): AdminOnly) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("pong, {}", auth.principal.display_name),
    })
}
