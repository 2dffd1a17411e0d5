// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal hydration.
//!
//! The token only proves a subject identifier. Display name and role are
//! read from the directory on every request so role changes apply without
//! waiting for the token to expire.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Role;
use crate::directory::{DirectoryError, UserDirectory, UserRecord};

/// Identity and authorization attributes for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }
}

impl From<&UserRecord> for Principal {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.name.clone(),
            email: record.email.clone(),
            role: record.role,
        }
    }
}

/// Request-scoped authentication result.
///
/// Present in the request extensions only when the bearer credential was
/// valid, not revoked, and its subject resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub principal: Principal,
    /// Token id (`jti`) of the credential that authenticated the request.
    pub token_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PrincipalError {
    #[error("no user for subject")]
    NotFound,

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Resolves token subjects into principals via the user directory.
#[derive(Clone)]
pub struct PrincipalResolver {
    directory: Arc<dyn UserDirectory>,
}

impl PrincipalResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub fn resolve(&self, subject: &str) -> Result<Principal, PrincipalError> {
        self.directory
            .find_by_email(subject)?
            .as_ref()
            .map(Principal::from)
            .ok_or(PrincipalError::NotFound)
    }
}
