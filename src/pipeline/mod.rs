//! Pipeline definition loading and bound-pipeline control.

pub mod controller;
pub mod definition;

pub use controller::{BoundPipeline, WaitPhase};
pub use definition::{DefinitionError, PipelineDefinition, PipelineSpec, Transform};
