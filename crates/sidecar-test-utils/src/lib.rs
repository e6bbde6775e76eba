//! # Sidecar Test Utilities
//!
//! Shared test utilities for the descriptor sidecar.
//!
//! This crate provides:
//! - Server test harness (`TestSidecarServer` for E2E tests)
//! - Mock identity provider and deployment manager (`wiremock`)
//! - Token builders for inbound bearer tokens
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sidecar_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestSidecarServer::spawn().await?;
//!
//!     let response = reqwest::get(format!("{}/health", server.url())).await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod mock_servers;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use mock_servers::*;
pub use server_harness::*;
pub use token_builders::*;
