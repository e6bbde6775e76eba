//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Every value the
//! sidecar must never print goes through these types: the OAuth client
//! secret, issued access/refresh/id tokens.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` over a secret field stays safe to pass to `tracing`. Secrets are
//! zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ClientCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = ClientCredentials {
//!     client_id: "ocm-sidecar".to_string(),
//!     client_secret: SecretString::from("s3cr3t"),
//! };
//!
//! // Debug output never contains the secret
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//!
//! // Reading the value is always an explicit call
//! assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
//! ```
//!
//! With the `serde` feature, `SecretString` deserializes straight from a
//! JSON string, which is how token endpoint responses are decoded.

pub use secrecy::{ExposeSecret, SecretString};

