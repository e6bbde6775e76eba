//! HTTP request handlers for the descriptor sidecar.

pub mod health;
pub mod metrics;
pub mod schedule;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use schedule::schedule_status;
