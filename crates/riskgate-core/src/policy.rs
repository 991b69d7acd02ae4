//! Deterministic decision policy.
//!
//! Maps (risk level, confidence) to an action with a fixed table:
//! 1. HIGH risk + confidence >= 0.85 → BLOCK
//! 2. HIGH risk + confidence >= 0.70 → REVIEW
//! 3. HIGH risk + confidence < 0.70 → REVIEW
//! 4. MEDIUM risk → REVIEW
//! 5. LOW risk → APPROVE
//! 6. Anything else → REVIEW
//!
//! These rules are not configurable. They are the policy.

use crate::types::{Action, Assessment, RiskLevel};

/// Minimum confidence for a high-risk transaction to be blocked outright.
pub const BLOCK_CONFIDENCE: f64 = 0.85;

/// Boundary between "medium" and "low" confidence for high-risk rationale.
pub const REVIEW_CONFIDENCE: f64 = 0.70;

/// The fixed decision table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionPolicy;

impl DecisionPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Decide from a free-text risk level.
    ///
    /// The level is matched case-insensitively; unrecognized levels route
    /// to review.
    pub fn decide(&self, risk_level: &str, confidence: f64) -> Action {
        match risk_level.parse::<RiskLevel>() {
            Ok(level) => self.decide_level(level, confidence),
            Err(_) => Action::Review,
        }
    }

    /// Decide from a typed risk level.
    pub fn decide_level(&self, risk_level: RiskLevel, confidence: f64) -> Action {
        match risk_level {
            RiskLevel::High if confidence >= BLOCK_CONFIDENCE => Action::Block,
            RiskLevel::High => Action::Review,
            RiskLevel::Medium => Action::Review,
            RiskLevel::Low => Action::Approve,
        }
    }

    /// Human-readable rationale for the action the table gives.
    pub fn explain(&self, assessment: &Assessment) -> String {
        let risk_level = assessment.risk_level;
        let confidence = assessment.confidence;
        let action = self.decide_level(risk_level, confidence);

        let decision = match risk_level {
            RiskLevel::High if confidence >= BLOCK_CONFIDENCE => {
                "HIGH confidence + HIGH risk → BLOCK transaction"
            }
            RiskLevel::High if confidence >= REVIEW_CONFIDENCE => {
                "MEDIUM confidence + HIGH risk → REVIEW transaction (requires manual verification)"
            }
            RiskLevel::High => {
                "LOW confidence + HIGH risk → REVIEW transaction (requires manual verification)"
            }
            RiskLevel::Medium => {
                "MEDIUM risk → REVIEW transaction (requires manual verification)"
            }
            RiskLevel::Low => "LOW risk → APPROVE transaction",
        };

        format!(
            "Risk Level: {} | Confidence: {:.1}% | Action: {}\nDecision: {}",
            risk_level.as_str().to_uppercase(),
            confidence * 100.0,
            action.as_str().to_uppercase(),
            decision
        )
    }
}
