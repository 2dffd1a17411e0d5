// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HMAC secret for token signing | unset (login disabled) |
//! | `JWT_TTL_SECS` | Lifetime of issued tokens | `3600` |
//! | `REVOCATION_DB_PATH` | redb file holding revoked tokens | `data/revocations.redb` |
//! | `REVOCATION_PURGE_INTERVAL_MS` | Interval between purge sweeps | `3600000` |
//! | `AUTH_INVALID_TOKEN_POLICY` | `fall_through` or `reject` | `fall_through` |
//! | `USERS_FILE` | JSON seed for the user directory | unset (empty directory) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,auth_server=debug,tower_http=info` |

#[cfg(test)]
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::InvalidTokenPolicy;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// HMAC-SHA256 signing secret. Never logged.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

pub const JWT_TTL_ENV: &str = "JWT_TTL_SECS";
pub const REVOCATION_DB_PATH_ENV: &str = "REVOCATION_DB_PATH";
pub const PURGE_INTERVAL_ENV: &str = "REVOCATION_PURGE_INTERVAL_MS";
pub const INVALID_TOKEN_POLICY_ENV: &str = "AUTH_INVALID_TOKEN_POLICY";
pub const USERS_FILE_ENV: &str = "USERS_FILE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_REVOCATION_DB_PATH: &str = "data/revocations.redb";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("invalid bind address {0}")]
    BindAddress(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub revocation_db_path: PathBuf,
    pub purge_interval: Duration,
    pub invalid_token_policy: InvalidTokenPolicy,
    pub users_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &if self.jwt_secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("token_ttl", &self.token_ttl)
            .field("revocation_db_path", &self.revocation_db_path)
            .field("purge_interval", &self.purge_interval)
            .field("invalid_token_policy", &self.invalid_token_policy)
            .field("users_file", &self.users_file)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => parse_num::<u16>(PORT_ENV, &raw, "a port number")?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::BindAddress(format!("{host}:{port}")))?;

        let token_ttl = match get(JWT_TTL_ENV) {
            Some(raw) => {
                let expected = "a positive number of seconds";
                let secs = parse_num::<u64>(JWT_TTL_ENV, &raw, expected)?;
                if secs == 0 {
                    return Err(invalid(JWT_TTL_ENV, expected, raw));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TOKEN_TTL,
        };

        let purge_interval = match get(PURGE_INTERVAL_ENV) {
            Some(raw) => {
                let expected = "a positive number of milliseconds";
                let ms = parse_num::<u64>(PURGE_INTERVAL_ENV, &raw, expected)?;
                if ms == 0 {
                    return Err(invalid(PURGE_INTERVAL_ENV, expected, raw));
                }
                Duration::from_millis(ms)
            }
            None => crate::revocation::DEFAULT_PURGE_INTERVAL,
        };

        let invalid_token_policy = match get(INVALID_TOKEN_POLICY_ENV) {
            Some(raw) => InvalidTokenPolicy::from_str(&raw).ok_or_else(|| {
                invalid(INVALID_TOKEN_POLICY_ENV, "`fall_through` or `reject`", raw)
            })?,
            None => InvalidTokenPolicy::default(),
        };

        let log_format = match get(LOG_FORMAT_ENV).map(|v| v.to_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(v) => return Err(invalid(LOG_FORMAT_ENV, "`json` or `pretty`", v)),
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret: get(JWT_SECRET_ENV).map(String::into_bytes).unwrap_or_default(),
            token_ttl,
            revocation_db_path: get(REVOCATION_DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REVOCATION_DB_PATH)),
            purge_interval,
            invalid_token_policy,
            users_file: get(USERS_FILE_ENV).map(PathBuf::from),
            log_format,
        })
    }

    #[cfg(test)]
    pub fn from_map(vars: &HashMap<&str, &str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }
}

fn parse_num<T: std::str::FromStr>(
    var: &'static str,
    raw: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(var, expected, raw.to_string()))
}

fn invalid(var: &'static str, expected: &'static str, value: String) -> ConfigError {
    ConfigError::Invalid {
        var,
        expected,
        value,
    }
}
