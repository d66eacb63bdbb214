//! Command-line interface for veriflow.
//!
//! Provides commands for running validation jobs against a pipeline cluster
//! or a task-graph scheduler, and for inspecting a pipeline's job status.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
