//! Structured response parsing.
//!
//! Model output is untrusted. The parser first attempts strict decoding
//! (JSON, schema, typed fields) and, on any failure, recovers what it can
//! with pattern-based extraction. Parsing never fails: every field ends up
//! with either a recovered value or its safe default.

mod fallback;
mod schema;

pub use fallback::{
    FallbackExtraction, FieldExtractionGap, DEFAULT_ACTION, DEFAULT_CONFIDENCE,
    DEFAULT_RISK_LEVEL,
};
pub use schema::{validate_response_schema, SchemaError};

use serde::Deserialize;
use thiserror::Error;

use crate::types::{Action, Assessment, RiskLevel};

/// Why strict decoding of a response failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseFailure {
    #[error("response is empty")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response does not match the assessment schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("response contains an unrecognized value: {0}")]
    InvalidValue(String),
}

impl ParseFailure {
    /// Variant name for logs. The Display text can quote model output.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseFailure::Empty => "empty",
            ParseFailure::InvalidJson(_) => "invalid_json",
            ParseFailure::SchemaViolation(_) => "schema_violation",
            ParseFailure::InvalidValue(_) => "invalid_value",
        }
    }
}

/// Which path produced an assessment.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseSource {
    /// The response decoded cleanly.
    Strict,

    /// Strict decoding failed and fields were recovered by pattern matching.
    Fallback {
        failure: ParseFailure,
        /// Fields that took their safe default.
        defaulted: Vec<&'static str>,
    },
}

impl ParseSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseSource::Fallback { .. })
    }

    /// Whether the given field was filled with its default value.
    pub fn defaulted(&self, field: &str) -> bool {
        match self {
            ParseSource::Strict => false,
            ParseSource::Fallback { defaulted, .. } => defaulted.contains(&field),
        }
    }
}

/// A parsed assessment together with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub assessment: Assessment,
    pub source: ParseSource,
}

/// The fields a model is allowed to supply. Audit fields are never
/// taken from model output.
#[derive(Deserialize)]
struct ResponseShape {
    risk_level: RiskLevel,
    key_risk_factors: Vec<String>,
    policy_references: Vec<String>,
    recommended_action: Action,
    confidence: f64,
}

impl From<ResponseShape> for Assessment {
    fn from(shape: ResponseShape) -> Self {
        Assessment::new(shape.risk_level, shape.recommended_action, shape.confidence)
            .with_risk_factors(shape.key_risk_factors)
            .with_policy_references(shape.policy_references)
    }
}

/// Turns raw model text into an [`Assessment`].
#[derive(Debug, Clone, Default)]
pub struct StructuredResponseParser;

impl StructuredResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a response, falling back to pattern extraction when needed.
    pub fn parse(&self, raw_text: &str) -> Assessment {
        self.parse_detailed(raw_text).assessment
    }

    /// Parse a response and report which path was taken.
    pub fn parse_detailed(&self, raw_text: &str) -> ParsedResponse {
        match self.decode_strict(raw_text) {
            Ok(assessment) => ParsedResponse {
                assessment,
                source: ParseSource::Strict,
            },
            Err(failure) => {
                tracing::debug!(
                    failure = failure.kind(),
                    "Strict decoding failed, using fallback extraction"
                );

                let extraction = self.extract_fallback(raw_text);
                let defaulted = extraction.defaulted_fields();
                for field in &defaulted {
                    tracing::debug!(field = *field, "Field not recovered, using safe default");
                }

                ParsedResponse {
                    assessment: extraction.into_assessment(),
                    source: ParseSource::Fallback { failure, defaulted },
                }
            }
        }
    }

    /// Decode a response that must be a complete, well-typed JSON object.
    ///
    /// A single surrounding Markdown code fence is tolerated.
    pub fn decode_strict(&self, raw_text: &str) -> Result<Assessment, ParseFailure> {
        let body = strip_code_fence(raw_text.trim());
        if body.is_empty() {
            return Err(ParseFailure::Empty);
        }

        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;

        validate_response_schema(&value).map_err(ParseFailure::SchemaViolation)?;

        let shape: ResponseShape =
            serde_json::from_value(value).map_err(|e| ParseFailure::InvalidValue(e.to_string()))?;

        Ok(shape.into())
    }

    /// Recover fields from free text, one pattern per field.
    pub fn extract_fallback(&self, raw_text: &str) -> FallbackExtraction {
        FallbackExtraction::extract(raw_text)
    }
}

/// Remove one surrounding ```-fence (with optional language tag).
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(newline) = rest.find('\n') else {
        return text;
    };
    let body = &rest[newline + 1..];
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
