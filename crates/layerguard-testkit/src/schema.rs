//! JSON schema validators for layerguard documents.
//!
//! Schemas are generated from the DTOs with schemars, so they always track
//! the current type definitions.

use jsonschema::JSONSchema;
use layerguard_types::{ChangeMetadata, ConfigFile, EnhancedMetadata};
use schemars::schema::RootSchema;

/// Error type for schema validation failures.
#[derive(Debug)]
pub struct SchemaValidationError {
    pub errors: Vec<String>,
}

impl std::fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Schema validation failed: {}", self.errors.join("; "))
    }
}

impl std::error::Error for SchemaValidationError {}

fn compile(root: RootSchema) -> JSONSchema {
    let value = serde_json::to_value(root).expect("schema should serialize");
    JSONSchema::compile(&value).expect("schema should compile")
}

pub fn config_schema() -> JSONSchema {
    compile(schemars::schema_for!(ConfigFile))
}

pub fn change_schema() -> JSONSchema {
    compile(schemars::schema_for!(ChangeMetadata))
}

pub fn enhanced_schema() -> JSONSchema {
    compile(schemars::schema_for!(EnhancedMetadata))
}

pub fn validate_config_file(config: &ConfigFile) -> Result<(), SchemaValidationError> {
    let json = serde_json::to_value(config).expect("ConfigFile should serialize");
    validate_with_schema(&config_schema(), &json)
}

pub fn validate_change_metadata(json: &serde_json::Value) -> Result<(), SchemaValidationError> {
    validate_with_schema(&change_schema(), json)
}

/// Validate a document as written by `layerguard detect` or `enhance`.
pub fn validate_enhanced_metadata(json: &serde_json::Value) -> Result<(), SchemaValidationError> {
    validate_with_schema(&enhanced_schema(), json)
}

fn validate_with_schema(
    schema: &JSONSchema,
    json: &serde_json::Value,
) -> Result<(), SchemaValidationError> {
    match schema.validate(json) {
        Ok(()) => Ok(()),
        Err(errors) => Err(SchemaValidationError {
            errors: errors.map(|e| e.to_string()).collect(),
        }),
    }
}
