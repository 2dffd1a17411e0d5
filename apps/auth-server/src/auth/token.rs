// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 bearer token codec.
//!
//! Tokens carry `{sub, iat, exp, jti, ext}`. `jti` is random per issuance so two
//! tokens issued for the same subject in the same second never collide in the
//! revocation list.
//!
//! Expiry is checked by the codec itself at second precision with no leeway;
//! the library's own `exp` validation (60 s default leeway) is disabled.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims written into every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    ext: BTreeMap<String, String>,
}

/// Subset of claims read without verifying the signature.
#[derive(Debug, Clone, Deserialize)]
struct UnverifiedClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("token lifetime must be at least one second")]
    InvalidTtl,

    #[error("token is malformed")]
    Malformed,
}

/// Why a token failed validation.
///
/// Callers at the HTTP boundary collapse all of these into a single
/// unauthenticated outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Expired,
    BadSignature,
    Malformed,
    SubjectMismatch,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::Expired => write!(f, "expired"),
            InvalidReason::BadSignature => write!(f, "bad_signature"),
            InvalidReason::Malformed => write!(f, "malformed"),
            InvalidReason::SubjectMismatch => write!(f, "subject_mismatch"),
        }
    }
}

/// A token whose signature and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub token_id: String,
    pub claims: BTreeMap<String, String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid(VerifiedToken),
    Invalid(InvalidReason),
}

impl TokenValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenValidation::Valid(_))
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and validates signed, time-bound session tokens.
///
/// The secret is injected once at construction. An empty secret leaves the
/// codec without keys: issuance fails and every token validates as
/// [`InvalidReason::BadSignature`].
pub struct TokenCodec {
    keys: Option<SigningKeys>,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let keys = (!secret.is_empty()).then(|| SigningKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        });

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self { keys, validation }
    }

    /// Whether a signing secret is configured.
    pub fn can_sign(&self) -> bool {
        self.keys.is_some()
    }

    /// Issue a token for `subject` valid for `ttl` from now.
    pub fn issue(
        &self,
        subject: &str,
        claims: BTreeMap<String, String>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, claims, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        subject: &str,
        claims: BTreeMap<String, String>,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| TokenError::Signing("signing secret is not configured".to_string()))?;

        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::InvalidTtl)?;
        if ttl_secs < 1 {
            return Err(TokenError::InvalidTtl);
        }

        let iat = issued_at.timestamp();
        let exp = iat.checked_add(ttl_secs).ok_or(TokenError::InvalidTtl)?;
        let session = SessionClaims {
            sub: subject.to_string(),
            iat,
            exp,
            jti: Uuid::new_v4().to_string(),
            ext: claims,
        };

        encode(&Header::new(Algorithm::HS256), &session, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate a token against the current time.
    pub fn validate(&self, token: &str, expected_subject: Option<&str>) -> TokenValidation {
        self.validate_at(token, expected_subject, Utc::now())
    }

    /// Validate a token against `now`.
    ///
    /// Signature first, then expiry (`exp > now`), then the optional subject hint.
    pub fn validate_at(
        &self,
        token: &str,
        expected_subject: Option<&str>,
        now: DateTime<Utc>,
    ) -> TokenValidation {
        let Some(keys) = self.keys.as_ref() else {
            return TokenValidation::Invalid(InvalidReason::BadSignature);
        };

        let data = match decode::<SessionClaims>(token, &keys.decoding, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => InvalidReason::BadSignature,
                    _ => InvalidReason::Malformed,
                };
                return TokenValidation::Invalid(reason);
            }
        };
        let claims = data.claims;

        if claims.exp <= now.timestamp() {
            return TokenValidation::Invalid(InvalidReason::Expired);
        }

        if let Some(expected) = expected_subject {
            if claims.sub != expected {
                return TokenValidation::Invalid(InvalidReason::SubjectMismatch);
            }
        }

        let (Some(issued_at), Some(expires_at)) = (
            DateTime::from_timestamp(claims.iat, 0),
            DateTime::from_timestamp(claims.exp, 0),
        ) else {
            return TokenValidation::Invalid(InvalidReason::Malformed);
        };

        TokenValidation::Valid(VerifiedToken {
            subject: claims.sub,
            token_id: claims.jti,
            claims: claims.ext,
            issued_at,
            expires_at,
        })
    }

    /// Read the subject without verifying the signature.
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        unverified_claims(token)?
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or(TokenError::Malformed)
    }

    /// Read the expiry without verifying the signature.
    pub fn extract_expiry(&self, token: &str) -> Result<DateTime<Utc>, TokenError> {
        let exp = unverified_claims(token)?.exp.ok_or(TokenError::Malformed)?;
        DateTime::from_timestamp(exp, 0).ok_or(TokenError::Malformed)
    }
}

fn unverified_claims(token: &str) -> Result<UnverifiedClaims, TokenError> {
    jsonwebtoken::dangerous::insecure_decode::<UnverifiedClaims>(token)
        .map(|data| data.claims)
        .map_err(|_| TokenError::Malformed)
}
