//! Pipeline template loading and binding.
//!
//! A `PipelineDefinition` is a declarative JSON document naming a transform
//! and the input repository roles it expects (`data`, `processors`). It is
//! loaded once per process and never mutated afterwards; binding substitutes
//! a session's actual repository names into the declared roles.

use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Built-in pipeline template shipped with the binary.
const BUILTIN_TEMPLATE: &str = include_str!("../../templates/validate.json");

/// Input repository role the data file lands in.
pub const ROLE_DATA: &str = "data";
/// Input repository role the processor module lands in.
pub const ROLE_PROCESSORS: &str = "processors";

static DEFINITION: OnceLock<PipelineDefinition> = OnceLock::new();

/// Errors that can occur while loading or binding a pipeline definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Failed to read template file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pipeline template: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Template declares unknown input role '{0}'")]
    UnknownRole(String),

    #[error("Template is missing required input role '{0}'")]
    MissingRole(String),
}

/// Transform invocation a pipeline runs when its inputs change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    /// Container image the transform runs in.
    pub image: String,
    /// Command line executed inside the image.
    pub cmd: Vec<String>,
}

/// A declared input repository role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRole {
    /// Role name, substituted with a concrete repository at bind time.
    pub role: String,
}

/// Declarative pipeline template: a transform plus its expected input roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub transform: Transform,
    pub inputs: Vec<InputRole>,
}

/// A definition bound to a specific session: concrete pipeline name and
/// concrete input repository names. This is what the cluster receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Pipeline name; also the name of its output repository.
    pub name: String,
    pub transform: Transform,
    /// Concrete input repository names.
    pub inputs: Vec<String>,
}

impl PipelineDefinition {
    /// Parses a definition from JSON text.
    pub fn parse(text: &str) -> Result<Self, DefinitionError> {
        let definition: Self = serde_json::from_str(text)?;
        definition.check_roles()?;
        Ok(definition)
    }

    /// Loads a definition from a template file.
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Returns the process-wide definition, loading it on first use.
    ///
    /// The first successful call fixes the definition for the lifetime of the
    /// process; later calls return the cached value and ignore `path`.
    pub fn global(path: Option<&Path>) -> Result<&'static Self, DefinitionError> {
        if let Some(definition) = DEFINITION.get() {
            return Ok(definition);
        }

        let definition = match path {
            Some(path) => Self::load(path)?,
            None => Self::parse(BUILTIN_TEMPLATE)?,
        };

        Ok(DEFINITION.get_or_init(|| definition))
    }

    /// Binds this definition to a session's repositories.
    ///
    /// The pipeline takes the session name, so its output repository is
    /// unique per run like the input repositories are.
    pub fn bind(
        &self,
        pipeline_name: &str,
        data_repo: &str,
        processors_repo: &str,
    ) -> Result<PipelineSpec, DefinitionError> {
        let inputs = self
            .inputs
            .iter()
            .map(|input| match input.role.as_str() {
                ROLE_DATA => Ok(data_repo.to_string()),
                ROLE_PROCESSORS => Ok(processors_repo.to_string()),
                other => Err(DefinitionError::UnknownRole(other.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PipelineSpec {
            name: pipeline_name.to_string(),
            transform: self.transform.clone(),
            inputs,
        })
    }

    fn check_roles(&self) -> Result<(), DefinitionError> {
        for required in [ROLE_DATA, ROLE_PROCESSORS] {
            if !self.inputs.iter().any(|input| input.role == required) {
                return Err(DefinitionError::MissingRole(required.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_template_parses() {
        let definition = PipelineDefinition::parse(BUILTIN_TEMPLATE).expect("builtin parses");
        assert_eq!(definition.inputs.len(), 2);
        assert!(!definition.transform.image.is_empty());
        assert!(!definition.transform.cmd.is_empty());
    }

    #[test]
    fn test_bind_substitutes_repository_names() {
        let definition = PipelineDefinition::parse(BUILTIN_TEMPLATE).expect("parse");
        let spec = definition
            .bind("run-1", "run-1-data", "run-1-processors")
            .expect("bind");

        assert_eq!(spec.name, "run-1");
        assert_eq!(spec.inputs, vec!["run-1-data", "run-1-processors"]);
        assert_eq!(spec.transform, definition.transform);
    }

    #[test]
    fn test_missing_role_is_rejected() {
        let text = r#"{
            "transform": { "image": "img", "cmd": ["run"] },
            "inputs": [ { "role": "data" } ]
        }"#;
        let result = PipelineDefinition::parse(text);
        assert!(matches!(result, Err(DefinitionError::MissingRole(role)) if role == "processors"));
    }

    #[test]
    fn test_unknown_role_fails_at_bind() {
        let text = r#"{
            "transform": { "image": "img", "cmd": ["run"] },
            "inputs": [ { "role": "data" }, { "role": "processors" }, { "role": "mystery" } ]
        }"#;
        let definition = PipelineDefinition::parse(text).expect("parse");
        let result = definition.bind("run-1", "d", "p");
        assert!(matches!(result, Err(DefinitionError::UnknownRole(role)) if role == "mystery"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(BUILTIN_TEMPLATE.as_bytes()).expect("write");

        let definition = PipelineDefinition::load(file.path()).expect("load");
        assert_eq!(definition.inputs.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = PipelineDefinition::load(Path::new("/nonexistent/pipeline.json"));
        assert!(matches!(result, Err(DefinitionError::Read { .. })));
    }

    #[test]
    fn test_global_is_cached() {
        let first = PipelineDefinition::global(None).expect("first load");
        let second = PipelineDefinition::global(None).expect("second load");
        assert!(std::ptr::eq(first, second));
    }
}
