//! Bearer token authentication for the sidecar's protected routes.
//!
//! The verification key is parsed once at startup. A key that fails to
//! parse does not stop the service: every protected request is answered
//! with `BearerError::KeyMaterialInvalid` instead.
//!
//! # Security
//!
//! - The `Authorization` header is checked before the key, so an absent
//!   header is always reported as such
//! - Only asymmetric algorithms of the configured family are accepted
//! - Generic error messages prevent information leakage

use crate::observability::metrics::record_bearer_validation;
use common::jwt::{extract_bearer_token, validate_token, BearerError, Claims, KeyFamily, SigningKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Validates `Authorization: Bearer <jwt>` headers against a fixed key.
#[derive(Debug, Clone)]
pub struct BearerValidator {
    key: Arc<Result<SigningKey, BearerError>>,
    leeway: Duration,
}

impl BearerValidator {
    /// Build a validator from base64 DER key material.
    ///
    /// Never fails: an unusable key is logged and remembered.
    #[must_use]
    pub fn new(material: &str, family: KeyFamily, leeway: Duration) -> Self {
        let key = SigningKey::from_base64_der(material, family);

        if key.is_err() {
            tracing::error!(
                target: "sidecar.auth",
                family = %family,
                "Verification key could not be loaded; protected routes will fail"
            );
        }

        Self {
            key: Arc::new(key),
            leeway,
        }
    }

    /// Authenticate a raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `BearerError::AuthHeaderMissing` - header absent or not `Bearer`
    /// - `BearerError::KeyMaterialInvalid` - verification key unusable
    /// - `BearerError::SignatureAlgorithmMismatch` - `alg` outside the key family
    /// - `BearerError::TokenInvalid` - any other verification failure
    #[instrument(skip_all, name = "sidecar.auth.validate")]
    pub fn validate_header(&self, header: Option<&str>) -> Result<Claims, BearerError> {
        let result = self.check(header);

        match &result {
            Ok(claims) => {
                tracing::debug!(
                    target: "sidecar.auth",
                    sub = claims.sub.as_deref().unwrap_or("-"),
                    "Bearer token accepted"
                );
                record_bearer_validation("success");
            }
            Err(e) => {
                tracing::debug!(target: "sidecar.auth", reason = e.kind(), "Bearer token rejected");
                record_bearer_validation(e.kind());
            }
        }

        result
    }

    fn check(&self, header: Option<&str>) -> Result<Claims, BearerError> {
        let token = extract_bearer_token(header)?;
        match &*self.key {
            Ok(key) => validate_token(token, key, self.leeway),
            Err(e) => Err(e.clone()),
        }
    }
}
