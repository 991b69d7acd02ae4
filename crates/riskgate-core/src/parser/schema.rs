//! JSON Schema validation for model responses.
//!
//! The expected response shape is described by
//! `schema/assessment.schema.json` and compiled once on first use.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded response schema (loaded at compile time).
const ASSESSMENT_SCHEMA_JSON: &str = include_str!("../../schema/assessment.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(ASSESSMENT_SCHEMA_JSON) {
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
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a decoded response against the schema.
///
/// Returns every violation as `"<message> at <instance path>"`.
pub fn validate_response_schema(response: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(response)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_response_passes() {
        let value = serde_json::json!({
            "risk_level": "high",
            "key_risk_factors": ["new device"],
            "policy_references": ["Section 2.1"],
            "recommended_action": "block",
            "confidence": 0.9,
            "grounding_notes": "extra fields are fine"
        });
        assert!(validate_response_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_fields_fail() {
        let value = serde_json::json!({
            "risk_level": "high",
            "confidence": 0.9
        });
        let errors = validate_response_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_confidence_out_of_range_fails() {
        let value = serde_json::json!({
            "risk_level": "low",
            "key_risk_factors": [],
            "policy_references": [],
            "recommended_action": "approve",
            "confidence": 1.5
        });
        assert!(validate_response_schema(&value).is_err());
    }

    #[test]
    fn test_list_of_non_strings_fails() {
        let value = serde_json::json!({
            "risk_level": "low",
            "key_risk_factors": [1, 2],
            "policy_references": [],
            "recommended_action": "approve",
            "confidence": 0.2
        });
        assert!(validate_response_schema(&value).is_err());
    }
}
