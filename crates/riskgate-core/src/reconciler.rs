//! Reconciliation of model-proposed actions with the decision policy.
//!
//! The model proposes; the policy decides. After [`AssessmentReconciler::reconcile`]
//! the recommended action always equals the policy's action, and
//! `validation_flag` records whether the model had proposed something else.

use crate::policy::DecisionPolicy;
use crate::types::Assessment;

/// Forces the final action to match the decision policy.
#[derive(Debug, Clone, Default)]
pub struct AssessmentReconciler {
    policy: DecisionPolicy,
}

impl AssessmentReconciler {
    pub fn new() -> Self {
        Self::with_policy(DecisionPolicy::new())
    }

    pub fn with_policy(policy: DecisionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Override the candidate's action if it disagrees with the policy.
    ///
    /// Labels are normalized at parse time, so the comparison is already
    /// case- and whitespace-insensitive.
    pub fn reconcile(&self, mut candidate: Assessment) -> Assessment {
        let policy_action = self
            .policy
            .decide_level(candidate.risk_level, candidate.confidence);
        let proposed = candidate.recommended_action;

        if proposed != policy_action {
            tracing::info!(
                from = %proposed,
                to = %policy_action,
                risk_level = %candidate.risk_level,
                confidence = candidate.confidence,
                "Overriding model action with policy action"
            );

            candidate.validation_notes = Some(format!(
                "Overrode model action '{}' with policy action '{}' (risk_level={}, confidence={:.2})",
                proposed, policy_action, candidate.risk_level, candidate.confidence
            ));
            candidate.recommended_action = policy_action;
            candidate.validation_flag = true;
        } else {
            candidate.validation_flag = false;
        }

        candidate
    }
}
