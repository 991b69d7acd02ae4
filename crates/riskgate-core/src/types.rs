//! Core value types shared by every triage stage.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A label that does not name a known risk level or action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized {kind}: '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Overall risk classification of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(UnknownLabel {
                kind: "risk level",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What should happen to the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Approve,
    Review,
    Block,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Review => "review",
            Action::Block => "block",
        }
    }
}

impl FromStr for Action {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" => Ok(Action::Approve),
            "review" => Ok(Action::Review),
            "block" => Ok(Action::Block),
            _ => Err(UnknownLabel {
                kind: "action",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Unmodified model output kept for audit. Never parsed again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawResponse {
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
    pub transaction_id: String,
}

/// A fraud-risk assessment for one transaction.
///
/// Created once per evaluation, filled by the parser, then reconciled
/// against the decision policy. After reconciliation
/// `recommended_action` always matches the policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub risk_level: RiskLevel,

    /// In extraction order, not ranked.
    pub key_risk_factors: Vec<String>,

    /// Policy text the model claims to rely on.
    pub policy_references: Vec<String>,

    pub recommended_action: Action,

    /// Always within [0.0, 1.0].
    pub confidence: f64,

    /// True iff reconciliation overrode the model's action.
    #[serde(default)]
    pub validation_flag: bool,

    #[serde(default)]
    pub validation_notes: Option<String>,

    #[serde(default)]
    pub raw_response: Option<RawResponse>,
}

impl Assessment {
    /// Build an assessment with no audit fields set.
    pub fn new(
        risk_level: RiskLevel,
        recommended_action: Action,
        confidence: f64,
    ) -> Self {
        Self {
            risk_level,
            key_risk_factors: Vec::new(),
            policy_references: Vec::new(),
            recommended_action,
            confidence: clamp_confidence(confidence),
            validation_flag: false,
            validation_notes: None,
            raw_response: None,
        }
    }

    pub fn with_risk_factors<I, S>(mut self, factors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_risk_factors = factors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_policy_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy_references = references.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the raw model output for audit.
    pub fn attach_raw_response(&mut self, raw: RawResponse) {
        self.raw_response = Some(raw);
    }
}

/// Force a confidence value into [0.0, 1.0]. Non-finite values become 0.0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// A retrieved unit of text (policy excerpt or historical case).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContextPassage {
    pub text: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ContextPassage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
