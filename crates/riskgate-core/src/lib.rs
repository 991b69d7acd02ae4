//! # riskgate-core
//!
//! Deterministic triage of language-model fraud-risk assessments.
//!
//! A model proposes an assessment for a transaction; this crate decides
//! what to do with it:
//! - Parse the untrusted response text into an [`Assessment`]
//! - Force the final action to follow a fixed [`DecisionPolicy`]
//! - Measure how well cited policy references are grounded in the
//!   retrieved context
//!
//! ## Key Guarantees
//!
//! 1. **Never fails on model output**: malformed text degrades to safe defaults
//! 2. **Policy wins**: the final action always equals the decision table's action
//! 3. **Traceable**: every override is flagged and explained
//! 4. **No I/O**: generation, retrieval and audit live in `riskgate-runtime`
//!
//! ## Example
//!
//! ```rust,ignore
//! use riskgate_core::{triage, Action};
//!
//! let assessment = triage(r#"{"risk_level": "medium", "recommended_action": "block", ...}"#);
//!
//! assert_eq!(assessment.recommended_action, Action::Review);
//! assert!(assessment.validation_flag);
//! ```

pub mod consistency;
pub mod grounding;
pub mod metrics;
pub mod parser;
pub mod policy;
pub mod reconciler;
pub mod types;

// Re-export main types at crate root
pub use consistency::{check_consistency, ConsistencyReport};
pub use grounding::{
    Embedder, EmbeddingError, GroundingMethod, GroundingReport, GroundingValidator,
    ReferenceVerdict, DEFAULT_THRESHOLD,
};
pub use metrics::{
    confusion_matrix, decision_accuracy, precision_recall_f1, BinaryMetrics, ConfusionMatrix,
};
pub use parser::{
    FieldExtractionGap, ParseFailure, ParseSource, ParsedResponse, StructuredResponseParser,
};
pub use policy::DecisionPolicy;
pub use reconciler::AssessmentReconciler;
pub use types::{Action, Assessment, ContextPassage, RawResponse, RiskLevel, UnknownLabel};

/// Parse a raw model response and reconcile it with the decision policy.
///
/// This is the whole deterministic stage in one call. It never fails; see
/// [`StructuredResponseParser::parse_detailed`] to learn which fields were
/// recovered or defaulted.
pub fn triage(raw_text: &str) -> Assessment {
    let candidate = StructuredResponseParser::new().parse(raw_text);
    AssessmentReconciler::new().reconcile(candidate)
}
