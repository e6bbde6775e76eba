//! Observability for the descriptor sidecar.
//!
//! Prometheus metrics are exposed at `/metrics`; see [`metrics`] for the
//! metric catalogue.

pub mod metrics;
