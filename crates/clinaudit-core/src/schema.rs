//! JSON Schema validation for model outputs and case corpus records.
//!
//! Schemas are embedded at compile time from `schema/*.schema.json` and
//! compiled once on first use. Validation never panics: failures come back
//! as a list of messages so callers can record them as outcome values.

use std::sync::OnceLock;
use thiserror::Error;

const MODEL_OUTPUT_SCHEMA_JSON: &str = include_str!("../schema/model_output.schema.json");
const BASE_CASE_SCHEMA_JSON: &str = include_str!("../schema/base_case.schema.json");
const FAMILY_VARIANT_SCHEMA_JSON: &str = include_str!("../schema/family_variant.schema.json");
const SUITE_ENTRY_SCHEMA_JSON: &str = include_str!("../schema/suite_entry.schema.json");

type CompiledSchema = OnceLock<Result<jsonschema::Validator, String>>;

static MODEL_OUTPUT: CompiledSchema = OnceLock::new();
static BASE_CASE: CompiledSchema = OnceLock::new();
static FAMILY_VARIANT: CompiledSchema = OnceLock::new();
static SUITE_ENTRY: CompiledSchema = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("Failed to load {kind} schema: {message}")]
    LoadError { kind: SchemaKind, message: String },
}

/// The record shapes this crate validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    ModelOutput,
    BaseCase,
    FamilyVariant,
    SuiteEntry,
}

impl SchemaKind {
    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::ModelOutput => "model_output",
            SchemaKind::BaseCase => "base_case",
            SchemaKind::FamilyVariant => "family_variant",
            SchemaKind::SuiteEntry => "suite_entry",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            SchemaKind::ModelOutput => MODEL_OUTPUT_SCHEMA_JSON,
            SchemaKind::BaseCase => BASE_CASE_SCHEMA_JSON,
            SchemaKind::FamilyVariant => FAMILY_VARIANT_SCHEMA_JSON,
            SchemaKind::SuiteEntry => SUITE_ENTRY_SCHEMA_JSON,
        }
    }

    fn cell(&self) -> &'static CompiledSchema {
        match self {
            SchemaKind::ModelOutput => &MODEL_OUTPUT,
            SchemaKind::BaseCase => &BASE_CASE,
            SchemaKind::FamilyVariant => &FAMILY_VARIANT,
            SchemaKind::SuiteEntry => &SUITE_ENTRY,
        }
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Get or initialize the compiled validator for a schema kind.
fn get_validator(kind: SchemaKind) -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = kind.cell().get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(kind.source()) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError {
            kind,
            message: e.clone(),
        }),
    }
}

/// Make sure every embedded schema compiles.
///
/// Call once at startup so a broken schema aborts the run before any case
/// is evaluated instead of surfacing as per-case violations.
pub fn ensure_schemas_loaded() -> Result<(), SchemaError> {
    for kind in [
        SchemaKind::ModelOutput,
        SchemaKind::BaseCase,
        SchemaKind::FamilyVariant,
        SchemaKind::SuiteEntry,
    ] {
        get_validator(kind)?;
    }
    Ok(())
}

/// Validate a JSON value against one of the embedded schemas.
///
/// # Returns
///
/// * `Ok(())` - value matches the schema
/// * `Err(Vec<String>)` - every violation, formatted with its instance path
pub fn validate(kind: SchemaKind, value: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator(kind).map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a model response value against the output shape.
pub fn validate_model_output(value: &serde_json::Value) -> Result<(), Vec<String>> {
    validate(SchemaKind::ModelOutput, value)
}
