//! Pattern-based field recovery for responses that fail strict decoding.
//!
//! Every field is extracted independently. A field that cannot be
//! recovered becomes a [`FieldExtractionGap`] and is later replaced by its
//! safe default; it never prevents the other fields from being read.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::types::{clamp_confidence, Action, Assessment, RiskLevel};

/// Risk level used when none can be recovered.
pub const DEFAULT_RISK_LEVEL: RiskLevel = RiskLevel::Medium;

/// Action used when none can be recovered.
pub const DEFAULT_ACTION: Action = Action::Review;

/// Confidence used when none can be recovered.
pub const DEFAULT_CONFIDENCE: f64 = 0.0;

lazy_static! {
    // Labels may be quoted and use ':' or '=' (JSON, YAML, key=value).

    static ref RISK_LEVEL_PATTERN: Regex = Regex::new(
        r#"(?i)"?risk_level"?\s*[:=]\s*"?(low|medium|high)\b"#
    ).unwrap();

    static ref ACTION_PATTERN: Regex = Regex::new(
        r#"(?i)"?recommended_action"?\s*[:=]\s*"?(approve|block|review)\b"#
    ).unwrap();

    static ref CONFIDENCE_PATTERN: Regex = Regex::new(
        r#"(?i)"?confidence"?\s*[:=]\s*"?([0-9]*\.?[0-9]+)"#
    ).unwrap();

    static ref RISK_FACTORS_PATTERN: Regex = Regex::new(
        r#"(?i)"?key_risk_factors"?[\]\)\}]*\s*[:=]\s*\[([^\]]+)\]"#
    ).unwrap();

    static ref POLICY_REFERENCES_PATTERN: Regex = Regex::new(
        r#"(?i)"?policy_references"?[\]\)\}]*\s*[:=]\s*\[([^\]]+)\]"#
    ).unwrap();

    static ref LIST_SEPARATOR: Regex = Regex::new(r"\s*,\s*").unwrap();
}

/// A single field the fallback extractor could not recover.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldExtractionGap {
    #[error("no {field} found in response")]
    Missing { field: &'static str },

    #[error("could not parse {field} from '{value}'")]
    Unparsable { field: &'static str, value: String },
}

impl FieldExtractionGap {
    /// Name of the field this gap refers to.
    pub fn field(&self) -> &'static str {
        match self {
            FieldExtractionGap::Missing { field } => field,
            FieldExtractionGap::Unparsable { field, .. } => field,
        }
    }
}

/// Per-field outcome of fallback extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackExtraction {
    pub risk_level: Result<RiskLevel, FieldExtractionGap>,
    pub recommended_action: Result<Action, FieldExtractionGap>,
    pub confidence: Result<f64, FieldExtractionGap>,
    pub key_risk_factors: Result<Vec<String>, FieldExtractionGap>,
    pub policy_references: Result<Vec<String>, FieldExtractionGap>,
}

impl FallbackExtraction {
    /// Scan raw text for every field.
    pub fn extract(raw_text: &str) -> Self {
        Self {
            risk_level: extract_label(raw_text, &RISK_LEVEL_PATTERN, "risk_level"),
            recommended_action: extract_label(raw_text, &ACTION_PATTERN, "recommended_action"),
            confidence: extract_confidence(raw_text),
            key_risk_factors: extract_list(raw_text, &RISK_FACTORS_PATTERN, "key_risk_factors"),
            policy_references: extract_list(
                raw_text,
                &POLICY_REFERENCES_PATTERN,
                "policy_references",
            ),
        }
    }

    /// Every field that was not recovered.
    pub fn gaps(&self) -> Vec<&FieldExtractionGap> {
        [
            self.risk_level.as_ref().err(),
            self.recommended_action.as_ref().err(),
            self.confidence.as_ref().err(),
            self.key_risk_factors.as_ref().err(),
            self.policy_references.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Names of the fields that will take their default value.
    pub fn defaulted_fields(&self) -> Vec<&'static str> {
        self.gaps().iter().map(|gap| gap.field()).collect()
    }

    /// Fill gaps with their safe defaults.
    pub fn into_assessment(self) -> Assessment {
        Assessment {
            risk_level: self.risk_level.unwrap_or(DEFAULT_RISK_LEVEL),
            key_risk_factors: self.key_risk_factors.unwrap_or_default(),
            policy_references: self.policy_references.unwrap_or_default(),
            recommended_action: self.recommended_action.unwrap_or(DEFAULT_ACTION),
            confidence: self.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            validation_flag: false,
            validation_notes: None,
            raw_response: None,
        }
    }
}

fn extract_label<T>(raw_text: &str, pattern: &Regex, field: &'static str) -> Result<T, FieldExtractionGap>
where
    T: std::str::FromStr,
{
    let caps = pattern
        .captures(raw_text)
        .ok_or(FieldExtractionGap::Missing { field })?;
    let value = &caps[1];
    value.parse().map_err(|_| FieldExtractionGap::Unparsable {
        field,
        value: value.to_string(),
    })
}

fn extract_confidence(raw_text: &str) -> Result<f64, FieldExtractionGap> {
    let caps = CONFIDENCE_PATTERN
        .captures(raw_text)
        .ok_or(FieldExtractionGap::Missing { field: "confidence" })?;
    let value = &caps[1];
    value
        .parse::<f64>()
        .map(clamp_confidence)
        .map_err(|_| FieldExtractionGap::Unparsable {
            field: "confidence",
            value: value.to_string(),
        })
}

fn extract_list(
    raw_text: &str,
    pattern: &Regex,
    field: &'static str,
) -> Result<Vec<String>, FieldExtractionGap> {
    let caps = pattern
        .captures(raw_text)
        .ok_or(FieldExtractionGap::Missing { field })?;

    Ok(LIST_SEPARATOR
        .split(&caps[1])
        .map(|item| item.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\''))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}
