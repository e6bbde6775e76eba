//! Bearer token verification against a fixed public signing key.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Signing key loading from base64 DER `SubjectPublicKeyInfo`
//! - Algorithm family pinning (RSA, EC, `EdDSA`)
//! - `Authorization` header parsing
//! - Signature, `exp` and `nbf` validation into [`Claims`]
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header `alg` is checked against the key's family BEFORE any
//!   cryptographic work, so `none`, HMAC-with-public-key and cross-family
//!   substitution are all rejected as algorithm mismatches
//! - Generic error messages prevent information leakage; detail goes to
//!   debug logs
//! - `sub` and `preferred_username` are redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_bearer_token, validate_token, KeyFamily, SigningKey};
//!
//! let key = SigningKey::from_base64_der(&config.verify_public_key, KeyFamily::Rsa)?;
//! let token = extract_bearer_token(auth_header)?;
//! let claims = validate_token(token, &key, Duration::ZERO)?;
//! ```

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical Keycloak access tokens are 1-2KB. Anything larger than this is
/// rejected before base64 decoding or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default `exp`/`nbf` leeway. Time claims are checked exactly.
pub const DEFAULT_LEEWAY: Duration = Duration::ZERO;

/// Maximum configurable `exp`/`nbf` leeway (10 minutes).
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

const PEM_LINE_WIDTH: usize = 64;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while authenticating an inbound bearer token.
///
/// Messages are generic; the specific cause is logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BearerError {
    /// `Authorization` header absent, not UTF-8, or not a `Bearer` scheme.
    #[error("Missing or malformed Authorization header")]
    AuthHeaderMissing,

    /// The configured verification key could not be loaded.
    #[error("Token verification is unavailable")]
    KeyMaterialInvalid,

    /// Token `alg` is not in the configured key family.
    #[error("The access token is signed with an unsupported algorithm")]
    SignatureAlgorithmMismatch,

    /// Malformed, oversized, badly signed, expired or not-yet-valid token.
    #[error("The access token is invalid or expired")]
    TokenInvalid,
}

impl BearerError {
    /// Bounded label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BearerError::AuthHeaderMissing => "missing_header",
            BearerError::KeyMaterialInvalid => "key_invalid",
            BearerError::SignatureAlgorithmMismatch => "algorithm_mismatch",
            BearerError::TokenInvalid => "invalid_token",
        }
    }
}

/// Unrecognised key family name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown key algorithm family '{0}' (expected RSA, EC or EDDSA)")]
pub struct UnknownKeyFamily(pub String);

// =============================================================================
// Signing Key
// =============================================================================

/// Asymmetric signature algorithm family a verification key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFamily {
    #[default]
    Rsa,
    Ec,
    EdDsa,
}

impl KeyFamily {
    /// JWS algorithms accepted for this family.
    #[must_use]
    pub fn algorithms(self) -> &'static [Algorithm] {
        match self {
            KeyFamily::Rsa => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            KeyFamily::Ec => &[Algorithm::ES256, Algorithm::ES384],
            KeyFamily::EdDsa => &[Algorithm::EdDSA],
        }
    }
}

impl FromStr for KeyFamily {
    type Err = UnknownKeyFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSA" => Ok(KeyFamily::Rsa),
            "EC" | "ECDSA" => Ok(KeyFamily::Ec),
            "EDDSA" | "ED25519" => Ok(KeyFamily::EdDsa),
            _ => Err(UnknownKeyFamily(s.to_string())),
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyFamily::Rsa => "RSA",
            KeyFamily::Ec => "EC",
            KeyFamily::EdDsa => "EDDSA",
        };
        f.write_str(name)
    }
}

/// Public verification key pinned to one algorithm family.
#[derive(Clone)]
pub struct SigningKey {
    family: KeyFamily,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Load a key from base64 (standard alphabet) DER `SubjectPublicKeyInfo`.
    ///
    /// Whitespace in `material` is ignored, so a key pasted across several
    /// lines of an environment file still loads.
    ///
    /// # Errors
    ///
    /// Returns `BearerError::KeyMaterialInvalid` if the base64 is invalid,
    /// the DER is not a public key, or the key is not of `family`.
    pub fn from_base64_der(material: &str, family: KeyFamily) -> Result<Self, BearerError> {
        let compact: String = material.split_whitespace().collect();

        let der = STANDARD.decode(compact.as_bytes()).map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Verification key is not valid base64");
            BearerError::KeyMaterialInvalid
        })?;

        if der.is_empty() {
            tracing::debug!(target: "common.jwt", "Verification key is empty");
            return Err(BearerError::KeyMaterialInvalid);
        }

        let pem = der_to_public_pem(&der);
        let decoding_key = match family {
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem.as_bytes()),
            KeyFamily::Ec => DecodingKey::from_ec_pem(pem.as_bytes()),
            KeyFamily::EdDsa => DecodingKey::from_ed_pem(pem.as_bytes()),
        }
        .map_err(|e| {
            tracing::debug!(
                target: "common.jwt",
                error = %e,
                family = %family,
                "Verification key is not a valid public key for the configured family"
            );
            BearerError::KeyMaterialInvalid
        })?;

        Ok(Self {
            family,
            decoding_key,
        })
    }

    #[must_use]
    pub fn family(&self) -> KeyFamily {
        self.family
    }
}

/// Wrap DER bytes in `PUBLIC KEY` PEM armor.
fn der_to_public_pem(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN PUBLIC KEY-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

// =============================================================================
// Claims
// =============================================================================

/// Verified token claims.
///
/// Well-known Keycloak claims are typed; everything else is kept in
/// `extra` so handlers can inspect it without a schema change.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Authorized party (the client the token was issued to).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Space-separated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Every other claim in the payload.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("iss", &self.iss)
            .field("azp", &self.azp)
            .field("scope", &self.scope)
            .field(
                "preferred_username",
                &self.preferred_username.as_ref().map(|_| "[REDACTED]"),
            )
            .field("extra_claims", &self.extra.len())
            .finish()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the token from an `Authorization` header value.
///
/// The value must start with the literal `Bearer` scheme followed by
/// whitespace; the token is the trimmed remainder.
///
/// # Errors
///
/// Returns `BearerError::AuthHeaderMissing` if the header is absent, uses a
/// different scheme, or carries no token.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, BearerError> {
    let value = header.ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Authorization header absent");
        BearerError::AuthHeaderMissing
    })?;

    let remainder = value
        .strip_prefix("Bearer")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "Authorization header is not a Bearer scheme");
            BearerError::AuthHeaderMissing
        })?;

    let token = remainder.trim();
    if token.is_empty() {
        tracing::debug!(target: "common.jwt", "Bearer scheme without a token");
        return Err(BearerError::AuthHeaderMissing);
    }

    Ok(token)
}

/// Extract the `alg` from a JWT header without verifying the signature.
///
/// # Errors
///
/// Returns `BearerError::TokenInvalid` if the token is oversized, not three
/// dot-separated segments, or its header is not base64url JSON with a
/// string `alg`.
pub fn extract_alg(token: &str) -> Result<String, BearerError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(BearerError::TokenInvalid);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(BearerError::TokenInvalid);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        BearerError::TokenInvalid
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        BearerError::TokenInvalid
    })?;

    header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "JWT header has no alg");
            BearerError::TokenInvalid
        })
}

/// Verify `token` against `key` and return its claims.
///
/// # Security Checks
///
/// 1. Size check - reject tokens > 8KB before parsing
/// 2. Header `alg` must belong to the key's family
/// 3. Signature verification
/// 4. `exp` required and in the future, `nbf` (if present) in the past,
///    both with `leeway`
///
/// `aud` is not validated.
///
/// # Errors
///
/// - `BearerError::SignatureAlgorithmMismatch` - `alg` outside the family
/// - `BearerError::TokenInvalid` - every other failure
pub fn validate_token(
    token: &str,
    key: &SigningKey,
    leeway: Duration,
) -> Result<Claims, BearerError> {
    let alg_name = extract_alg(token)?;

    let accepted = key.family.algorithms();
    let alg = Algorithm::from_str(&alg_name)
        .ok()
        .filter(|alg| accepted.contains(alg))
        .ok_or_else(|| {
            tracing::debug!(
                target: "common.jwt",
                alg = %alg_name,
                family = %key.family,
                "Token algorithm not accepted for key family"
            );
            BearerError::SignatureAlgorithmMismatch
        })?;

    let mut validation = Validation::new(alg);
    validation.algorithms = accepted.to_vec();
    validation.leeway = leeway.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;

    let token_data = decode::<Claims>(token, &key.decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Token verification failed");
        match e.kind() {
            ErrorKind::InvalidAlgorithm => BearerError::SignatureAlgorithmMismatch,
            _ => BearerError::TokenInvalid,
        }
    })?;

    Ok(token_data.claims)
}

// =============================================================================
// Tests
// =============================================================================
