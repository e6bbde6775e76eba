//! Background tasks for the descriptor sidecar.
//!
//! # Tasks
//!
//! - `scheduler` - Periodically triggers execution and resource sync on the
//!   deployment manager

pub mod scheduler;

pub use scheduler::{run_tick, start_scheduler, TickError, TickReport};
