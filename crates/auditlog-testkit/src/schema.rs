//! JSON schema validators for auditlog DTOs.
//!
//! Schemas are generated from the types with schemars and compiled once per
//! call; tests validate serialized values against them.

use auditlog_types::{RunConfig, RunReceipt};
use jsonschema::JSONSchema;
use schemars::schema_for;

/// Error type for schema validation failures.
#[derive(Debug)]
pub struct SchemaValidationError {
    /// The validation errors.
    pub errors: Vec<String>,
}

impl std::fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Schema validation failed: {}", self.errors.join("; "))
    }
}

impl std::error::Error for SchemaValidationError {}

fn compile(schema: schemars::schema::RootSchema) -> JSONSchema {
    let value = serde_json::to_value(schema).expect("schema should serialize to JSON");
    JSONSchema::compile(&value).expect("schema should compile")
}

pub fn load_run_config_schema() -> JSONSchema {
    compile(schema_for!(RunConfig))
}

pub fn load_run_receipt_schema() -> JSONSchema {
    compile(schema_for!(RunReceipt))
}

/// Validate a RunConfig against its JSON schema.
pub fn validate_run_config(config: &RunConfig) -> Result<(), SchemaValidationError> {
    let json = serde_json::to_value(config).expect("RunConfig should serialize to JSON");
    validate_run_config_json(&json)
}

/// Validate a RunReceipt against its JSON schema.
pub fn validate_run_receipt(receipt: &RunReceipt) -> Result<(), SchemaValidationError> {
    let json = serde_json::to_value(receipt).expect("RunReceipt should serialize to JSON");
    validate_run_receipt_json(&json)
}

/// Validate any JSON value against the RunConfig schema.
pub fn validate_run_config_json(json: &serde_json::Value) -> Result<(), SchemaValidationError> {
    validate_with_schema(&load_run_config_schema(), json)
}

/// Validate any JSON value against the RunReceipt schema.
pub fn validate_run_receipt_json(json: &serde_json::Value) -> Result<(), SchemaValidationError> {
    validate_with_schema(&load_run_receipt_schema(), json)
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

/// Check if a string is in snake_case format.
pub fn is_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Recursively collect all object keys from a JSON value.
pub fn collect_field_names(value: &serde_json::Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_field_names_recursive(value, &mut names);
    names
}

fn collect_field_names_recursive(value: &serde_json::Value, names: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                names.push(key.clone());
                collect_field_names_recursive(val, names);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr {
                collect_field_names_recursive(item, names);
            }
        }
        _ => {}
    }
}

/// Verify all field names in a JSON value are snake_case.
///
/// Returns the offending names on failure.
pub fn verify_snake_case_fields(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let bad: Vec<String> = collect_field_names(value)
        .into_iter()
        .filter(|name| !is_snake_case(name))
        .collect();
    if bad.is_empty() { Ok(()) } else { Err(bad) }
}
