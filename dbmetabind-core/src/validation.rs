//! JSON Schema validation for the snapshot output format.
//!
//! Snapshots are written as `.dbmetabind.json` documents. This module
//! validates such documents against an embedded JSON Schema before they are
//! deserialized, and rejects documents that carry a connection URL with an
//! embedded password.
//!
//! # Example
//! ```rust
//! use dbmetabind_core::fingerprint::Fingerprint;
//! use dbmetabind_core::models::MetadataSnapshot;
//! use dbmetabind_core::validation::{initialize_schema_validator, validate_snapshot_output};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! initialize_schema_validator()?;
//! let snapshot = MetadataSnapshot::new(Fingerprint::compute("SQLite", "3.45.0", None)?);
//! let json_value = serde_json::to_value(&snapshot)?;
//!
//! validate_snapshot_output(&json_value)?;
//! # Ok(())
//! # }
//! ```

use crate::models::MetadataSnapshot;
use jsonschema::Validator;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// JSON Schema validation errors with field-level reporting
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Schema compilation failed during initialization
    #[error("JSON Schema compilation failed: {message}")]
    SchemaCompilation { message: String },

    /// Validation failed with specific field errors
    #[error("Snapshot validation failed with {error_count} errors: {errors:?}")]
    ValidationFailed {
        error_count: usize,
        errors: Vec<String>,
    },

    /// Unsupported format version detected
    #[error("Unsupported format version '{version}'. Supported versions: {supported:?}")]
    UnsupportedVersion {
        version: String,
        supported: Vec<String>,
    },

    /// A connection URL with credentials found in the document
    #[error("Security validation failed: {reason}")]
    SecurityViolation { reason: String },

    /// JSON parsing error
    #[error("JSON parsing failed: {source}")]
    JsonParsing {
        #[from]
        source: serde_json::Error,
    },
}

/// Supported format versions
const SUPPORTED_VERSIONS: &[&str] = &[crate::models::FORMAT_VERSION];

/// Embedded JSON Schema for v1.0 snapshots
const SCHEMA_V1_0: &str = r##"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "dbmetabind Metadata Snapshot Format v1.0",
  "type": "object",
  "required": [
    "format_version", "fingerprint", "catalogs", "schemas", "table_types",
    "tables", "functions", "procedures", "type_info", "client_info_properties",
    "unattached", "reports", "collection_metadata"
  ],
  "$defs": {
    "records": { "type": "array", "items": { "type": "object" } },
    "category": {
      "enum": [
        "catalogs", "schemas", "table_types", "tables", "columns",
        "column_privileges", "primary_keys", "foreign_keys", "indices",
        "privileges", "best_row_identifiers", "version_columns",
        "pseudo_columns", "functions", "function_columns", "procedures",
        "procedure_columns", "type_info", "client_info_properties",
        "properties"
      ]
    }
  },
  "properties": {
    "format_version": { "type": "string", "pattern": "^1\\.0$" },
    "fingerprint": {
      "type": "object",
      "required": ["product_name", "product_version"],
      "properties": {
        "product_name": { "type": "string", "minLength": 1 },
        "product_version": { "type": "string" },
        "driver_version": { "type": ["string", "null"] }
      }
    },
    "catalogs": { "$ref": "#/$defs/records" },
    "schemas": { "$ref": "#/$defs/records" },
    "table_types": { "$ref": "#/$defs/records" },
    "tables": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "table_name": { "type": ["string", "null"] },
          "columns": { "$ref": "#/$defs/records" },
          "column_privileges": { "$ref": "#/$defs/records" },
          "primary_keys": { "$ref": "#/$defs/records" },
          "foreign_keys": { "$ref": "#/$defs/records" },
          "indices": { "$ref": "#/$defs/records" },
          "privileges": { "$ref": "#/$defs/records" },
          "best_row_identifiers": { "$ref": "#/$defs/records" },
          "version_columns": { "$ref": "#/$defs/records" },
          "pseudo_columns": { "$ref": "#/$defs/records" }
        }
      }
    },
    "functions": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": { "columns": { "$ref": "#/$defs/records" } }
      }
    },
    "procedures": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": { "columns": { "$ref": "#/$defs/records" } }
      }
    },
    "type_info": { "$ref": "#/$defs/records" },
    "client_info_properties": { "$ref": "#/$defs/records" },
    "properties": { "type": ["object", "null"] },
    "unattached": {
      "type": "object",
      "properties": {
        "columns": { "$ref": "#/$defs/records" },
        "column_privileges": { "$ref": "#/$defs/records" },
        "primary_keys": { "$ref": "#/$defs/records" },
        "foreign_keys": { "$ref": "#/$defs/records" },
        "indices": { "$ref": "#/$defs/records" },
        "privileges": { "$ref": "#/$defs/records" },
        "best_row_identifiers": { "$ref": "#/$defs/records" },
        "version_columns": { "$ref": "#/$defs/records" },
        "pseudo_columns": { "$ref": "#/$defs/records" },
        "function_columns": { "$ref": "#/$defs/records" },
        "procedure_columns": { "$ref": "#/$defs/records" }
      }
    },
    "reports": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["category", "status"],
        "properties": {
          "category": { "$ref": "#/$defs/category" },
          "status": { "enum": ["collected", "skipped", "unsupported"] },
          "records": { "type": "integer", "minimum": 0 },
          "reason": { "type": "string" }
        },
        "if": { "properties": { "status": { "const": "collected" } } },
        "then": { "required": ["records"] },
        "else": { "required": ["reason"] }
      }
    },
    "collection_metadata": {
      "type": "object",
      "required": ["collected_at", "collection_duration_ms", "collector_version"],
      "properties": {
        "collected_at": { "type": "string", "format": "date-time" },
        "collection_duration_ms": { "type": "integer", "minimum": 0 },
        "collector_version": { "type": "string", "minLength": 1 },
        "warnings": { "type": "array", "items": { "type": "string" }, "default": [] }
      }
    }
  }
}"##;

/// Compiled JSON Schema instance (initialized once)
static COMPILED_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// Initialize and compile the JSON Schema for validation
///
/// Compiles the embedded schema and caches it for reuse. Calling it again
/// is harmless.
///
/// # Errors
/// Returns `ValidationError::SchemaCompilation` if the embedded schema is invalid.
pub fn initialize_schema_validator() -> Result<(), ValidationError> {
    if COMPILED_SCHEMA.get().is_some() {
        return Ok(());
    }

    let schema_json = get_schema_definition()?;
    let compiled = jsonschema::validator_for(&schema_json).map_err(|e| {
        ValidationError::SchemaCompilation {
            message: format!("Schema compilation error: {}", e),
        }
    })?;

    // Another thread may have won the race; either value is identical
    let _ = COMPILED_SCHEMA.set(compiled);

    Ok(())
}

/// Validate a snapshot JSON document against the JSON Schema
///
/// Checks, in order: format version compatibility, JSON Schema structure,
/// and absence of credential-carrying connection URLs.
///
/// # Errors
/// Returns detailed validation errors if the JSON doesn't conform to the
/// schema or contains a credential.
pub fn validate_snapshot_output(json_value: &Value) -> Result<(), ValidationError> {
    initialize_schema_validator()?;
    let schema = COMPILED_SCHEMA
        .get()
        .ok_or_else(|| ValidationError::SchemaCompilation {
            message: "Schema validator not initialized".to_string(),
        })?;

    validate_format_version(json_value)?;

    let errors: Vec<String> = schema
        .iter_errors(json_value)
        .map(|error| error.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ValidationError::ValidationFailed {
            error_count: errors.len(),
            errors,
        });
    }

    validate_no_credentials_recursive(json_value, "")?;

    Ok(())
}

/// Ensures the format_version field is present and supported.
fn validate_format_version(json_value: &Value) -> Result<(), ValidationError> {
    let version = json_value
        .get("format_version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ValidationError::ValidationFailed {
            error_count: 1,
            errors: vec!["Missing required field 'format_version'".to_string()],
        })?;

    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ValidationError::UnsupportedVersion {
            version: version.to_string(),
            supported: SUPPORTED_VERSIONS.iter().map(|s| s.to_string()).collect(),
        });
    }

    Ok(())
}

/// Recursively rejects string values that are URLs with a password
fn validate_no_credentials_recursive(value: &Value, path: &str) -> Result<(), ValidationError> {
    match value {
        Value::String(s) => {
            if let Ok(url) = url::Url::parse(s)
                && url.password().is_some()
            {
                return Err(ValidationError::SecurityViolation {
                    reason: format!(
                        "Connection URL with credentials found at path '{}': {}",
                        path,
                        crate::error::redact_database_url(s)
                    ),
                });
            }
        }
        Value::Object(obj) => {
            for (key, val) in obj {
                let new_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                validate_no_credentials_recursive(val, &new_path)?;
            }
        }
        Value::Array(arr) => {
            for (index, item) in arr.iter().enumerate() {
                let new_path = format!("{}[{}]", path, index);
                validate_no_credentials_recursive(item, &new_path)?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// Parses, validates and deserializes a snapshot document.
///
/// # Errors
/// Returns validation errors for malformed JSON, schema violations, or
/// embedded credentials.
pub fn validate_and_parse_snapshot(json_str: &str) -> Result<MetadataSnapshot, ValidationError> {
    let json_value: Value = serde_json::from_str(json_str)?;

    validate_snapshot_output(&json_value)?;

    let snapshot: MetadataSnapshot = serde_json::from_value(json_value)?;
    Ok(snapshot)
}

/// Get the embedded JSON Schema as a parsed Value for external use
pub fn get_schema_definition() -> Result<Value, ValidationError> {
    serde_json::from_str(SCHEMA_V1_0).map_err(|e| ValidationError::SchemaCompilation {
        message: format!("Failed to parse embedded schema: {}", e),
    })
}
