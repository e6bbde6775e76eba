//! Descriptor sidecar error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are generic; the specific cause is logged
//! server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::BearerError;
use serde::Serialize;
use thiserror::Error;

const WWW_AUTHENTICATE_MISSING: &str = "Bearer realm=\"descriptor-sidecar\"";
const WWW_AUTHENTICATE_INVALID: &str =
    "Bearer realm=\"descriptor-sidecar\", error=\"invalid_token\"";

/// Descriptor sidecar error type.
///
/// Maps to HTTP status codes:
/// - Auth(AuthHeaderMissing | SignatureAlgorithmMismatch | TokenInvalid): 401
/// - Auth(KeyMaterialInvalid): 500
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error(transparent)]
    Auth(#[from] BearerError),
}

impl SidecarError {
    /// HTTP status and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            SidecarError::Auth(BearerError::AuthHeaderMissing) => {
                (StatusCode::UNAUTHORIZED, "AUTH_HEADER_MISSING")
            }
            SidecarError::Auth(BearerError::SignatureAlgorithmMismatch) => {
                (StatusCode::UNAUTHORIZED, "ALGORITHM_MISMATCH")
            }
            SidecarError::Auth(BearerError::TokenInvalid) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN")
            }
            SidecarError::Auth(BearerError::KeyMaterialInvalid) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "KEY_MATERIAL_INVALID")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for SidecarError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if matches!(self, SidecarError::Auth(BearerError::KeyMaterialInvalid)) {
            tracing::error!(
                target: "sidecar.auth",
                "Rejecting request: verification key material is invalid"
            );
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            let challenge = if matches!(self, SidecarError::Auth(BearerError::AuthHeaderMissing)) {
                WWW_AUTHENTICATE_MISSING
            } else {
                WWW_AUTHENTICATE_INVALID
            };
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}
