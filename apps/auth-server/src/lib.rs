// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Auth Server - Bearer Session Authentication
//!
//! Issues HS256 bearer tokens, authenticates requests through an explicit
//! tower middleware stack and supports logout by keeping a persisted
//! revocation list of tokens that have not expired yet.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - Token codec, authentication stage, extractors, logout
//! - `revocation` - Revocation list (redb) and its periodic purge
//! - `directory` - User lookup used to hydrate principals
//! - `diagnostics` - Request ids and per-request tracing span

pub mod api;
pub mod auth;
pub mod config;
pub mod diagnostics;
pub mod directory;
pub mod error;
pub mod models;
pub mod revocation;
pub mod state;
