//! `wiremock` stand-ins for the sidecar's outbound dependencies.

use common::testing::{TEST_CLIENT_ID, TEST_REALM};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token endpoint path for the test realm.
pub fn token_path() -> String {
    format!("/realms/{TEST_REALM}/protocol/openid-connect/token")
}

/// Mock identity provider serving the client-credentials token endpoint.
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to use as `KEYCLOAK_BASE_URL`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Issue `access_token` with lifetime `expires_in` seconds to the test
    /// client. Expects exactly `times` token requests.
    pub async fn issue_token(&self, access_token: &str, expires_in: i64, times: u64) {
        Mock::given(method("POST"))
            .and(path(token_path()))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains(format!("client_id={TEST_CLIENT_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "expires_in": expires_in,
                "refresh_expires_in": 0,
                "token_type": "Bearer",
                "not-before-policy": 0,
                "scope": "profile email"
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer every token request with `status`.
    pub async fn reject(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(token_path()))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": "unauthorized_client",
                "error_description": "Invalid client or Invalid client credentials"
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of token requests received so far.
    pub async fn token_requests(&self) -> usize {
        count_requests(&self.server, &token_path()).await
    }
}

/// Mock deployment manager serving `/execute` and `/resource/sync`.
pub struct MockDeployManager {
    server: MockServer,
}

impl MockDeployManager {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to use as `DEPLOY_MANAGER_URL`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Answer `GET /execute` with `status`.
    pub async fn execute_responds(&self, status: u16) {
        self.respond("/execute", status).await;
    }

    /// Answer `GET /resource/sync` with `status`.
    pub async fn sync_responds(&self, status: u16) {
        self.respond("/resource/sync", status).await;
    }

    async fn respond(&self, endpoint: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn execute_requests(&self) -> usize {
        count_requests(&self.server, "/execute").await
    }

    pub async fn sync_requests(&self) -> usize {
        count_requests(&self.server, "/resource/sync").await
    }

    /// `Authorization` header values received on any endpoint, in order.
    pub async fn authorization_headers(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.headers.get("authorization"))
            .filter_map(|v| v.to_str().ok().map(ToString::to_string))
            .collect()
    }
}

async fn count_requests(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
