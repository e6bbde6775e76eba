//! Builders for inbound bearer tokens.
//!
//! Tokens are signed with the fixed keys in `common::testing`.

pub use common::testing::{
    default_claims, sign_eddsa, sign_es256, sign_hs256_with_public_key, sign_rs256,
    sign_rs256_with_other_key, sign_unsigned, tamper_signature, OTHER_RSA_PUBLIC_KEY_B64,
    TEST_CLIENT_ID, TEST_EC_PUBLIC_KEY_B64, TEST_ED_PUBLIC_KEY_B64, TEST_RSA_PUBLIC_KEY_B64,
};

use serde_json::Value;

/// Builder for signed test tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .subject("service-account-deployer")
///     .expires_in(-60)
///     .sign_rs256();
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Value,
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTokenBuilder {
    /// Start from `default_claims()`: valid for an hour.
    pub fn new() -> Self {
        Self {
            claims: default_claims(),
        }
    }

    pub fn subject(mut self, sub: &str) -> Self {
        self.claims["sub"] = Value::from(sub);
        self
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.claims["scope"] = Value::from(scope);
        self
    }

    /// Set `exp` relative to now. Negative values produce an expired token.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.claims["exp"] = Value::from(chrono::Utc::now().timestamp() + seconds);
        self
    }

    /// Set `nbf` relative to now. Positive values produce a token that is
    /// not yet valid.
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.claims["nbf"] = Value::from(chrono::Utc::now().timestamp() + seconds);
        self
    }

    /// Add an arbitrary claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims[name] = value;
        self
    }

    pub fn claims(&self) -> &Value {
        &self.claims
    }

    pub fn sign_rs256(&self) -> String {
        sign_rs256(&self.claims)
    }

    pub fn sign_es256(&self) -> String {
        sign_es256(&self.claims)
    }

    pub fn sign_eddsa(&self) -> String {
        sign_eddsa(&self.claims)
    }
}

/// `Authorization` header value for `token`.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_claims() {
        let builder = TestTokenBuilder::new()
            .subject("someone")
            .scope("deploy")
            .claim("tenant", Value::from("edge-1"));

        assert_eq!(builder.claims()["sub"], "someone");
        assert_eq!(builder.claims()["scope"], "deploy");
        assert_eq!(builder.claims()["tenant"], "edge-1");
    }

    #[test]
    fn test_expires_in_negative_is_in_the_past() {
        let builder = TestTokenBuilder::new().expires_in(-60);
        let exp = builder.claims()["exp"].as_i64().unwrap();
        assert!(exp < chrono::Utc::now().timestamp());
    }

    #[test]
    fn test_signed_token_has_three_segments() {
        let token = TestTokenBuilder::new().sign_rs256();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(bearer("abc"), "Bearer abc");
    }
}
