//! Authentication middleware for protected routes.
//!
//! Validates the `Authorization: Bearer <jwt>` header and injects the
//! verified claims into request extensions.

use crate::auth::BearerValidator;
use crate::errors::SidecarError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<BearerValidator>,
}

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with `WWW-Authenticate` if the header is missing or the token is
///   rejected
/// - 500 if the verification key is unusable
/// - Otherwise continues with `Claims` in extensions
#[instrument(skip(state, req, next), name = "sidecar.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, SidecarError> {
    // A non-UTF-8 header value is treated as absent
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let claims = state.validator.validate_header(auth_header).map_err(|e| {
        tracing::debug!(
            target: "sidecar.middleware.auth",
            path = %req.uri().path(),
            reason = e.kind(),
            "Request rejected"
        );
        SidecarError::from(e)
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use common::jwt::{Claims, KeyFamily};
    use common::testing::{default_claims, sign_rs256, TEST_RSA_PUBLIC_KEY_B64};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn whoami(Extension(claims): Extension<Claims>) -> String {
        claims.sub.unwrap_or_default()
    }

    fn app(material: &str) -> Router {
        let state = Arc::new(AuthState {
            validator: Arc::new(BearerValidator::new(
                material,
                KeyFamily::Rsa,
                Duration::ZERO,
            )),
        });

        Router::new()
            .route("/whoami", get(whoami))
            .route_layer(middleware::from_fn_with_state(state, require_auth))
    }

    fn request(auth: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler_with_claims() {
        let header = format!("Bearer {}", sign_rs256(&default_claims()));

        let response = app(TEST_RSA_PUBLIC_KEY_B64)
            .oneshot(request(Some(&header)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"service-account-ocm");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = app(TEST_RSA_PUBLIC_KEY_B64)
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let response = app(TEST_RSA_PUBLIC_KEY_B64)
            .oneshot(request(Some("Bearer not.a.jwt")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_key_material_is_server_error() {
        let header = format!("Bearer {}", sign_rs256(&default_claims()));

        let response = app("%%%").oneshot(request(Some(&header))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
