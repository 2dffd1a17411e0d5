// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token authentication.
//!
//! ## Flow
//!
//! 1. `POST /api/auth/login` verifies the password and issues an HS256 token
//! 2. Every request passes through [`authenticate`], which checks the
//!    revocation list, validates the token and resolves the [`Principal`]
//! 3. Handlers read the result with [`CurrentUser`] or [`AdminOnly`]
//! 4. `POST /api/auth/logout` revokes the token via [`SessionTerminator`]

pub mod error;
pub mod extractor;
pub mod interceptor;
pub mod password;
pub mod principal;
pub mod roles;
pub mod session;
pub mod token;

pub use error::AuthError;
pub use extractor::{AdminOnly, CurrentUser};
pub use interceptor::{
    authenticate, bearer_from_header, bearer_token, AuthOutcome, Authenticator, InvalidTokenPolicy,
};
pub use principal::{Authentication, Principal, PrincipalError, PrincipalResolver};
pub use roles::Role;
pub use session::{LogoutOutcome, SessionError, SessionTerminator};
pub use token::{InvalidReason, TokenCodec, TokenError, TokenValidation, VerifiedToken};
