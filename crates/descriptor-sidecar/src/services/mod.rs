//! Service layer for the descriptor sidecar.
//!
//! # Components
//!
//! - `deploy_manager` - HTTP client for the deployment manager

pub mod deploy_manager;

pub use deploy_manager::{
    DeployManagerClient, DeploymentManager, DownstreamError, Endpoint, Exchange,
};
