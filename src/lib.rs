//! veriflow: run data-validation jobs on a remote pipeline cluster.
//!
//! This library stages an input dataset and a processor module into
//! run-scoped cluster repositories, triggers a bound pipeline, waits for
//! completion, and retrieves the resulting report.

// Core modules
pub mod cli;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{ClusterEngine, DataSource, ProcessorModule, TaskGraphEngine, ValidationBackend};
pub use error::{ClusterError, EngineError};
