//! Descriptor Sidecar Library
//!
//! A sidecar that keeps a deployment manager in step with its descriptors:
//!
//! - Obtains its own bearer token via OAuth2 client credentials and caches
//!   it until expiry
//! - Every period, triggers an execution and then a resource sync on the
//!   deployment manager
//! - Verifies inbound bearer tokens against a configured public key
//!
//! # Architecture
//!
//! ```text
//! tasks/scheduler.rs -> common::token_manager -> services/deploy_manager.rs
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Bearer token validation
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics layers
//! - `models` - Response models
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Deployment manager client
//! - `tasks` - Scheduler background task

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod tasks;
