//! Prompt templates for fraud-risk assessment.
//!
//! The system prompt fixes the analyst role and the JSON answer shape; the
//! user prompt carries the transaction and the retrieved context.

use riskgate_core::ContextPassage;

/// Instructions sent as the system message of every assessment.
pub const SYSTEM_PROMPT: &str = r#"You are a fraud risk analyst specializing in grounded reasoning.

CRITICAL INSTRUCTIONS - MUST FOLLOW:

1. GROUNDING REQUIREMENT: You MUST only cite policies and information that
   explicitly appear in the provided context documents.

2. POLICY REFERENCES:
   - ONLY cite policies found in the Context section
   - Do NOT invent policy names or section numbers
   - Quote the exact policy language from documents
   - If a policy is not in context, do NOT mention it

3. RISK FACTORS:
   - ONLY identify risk factors that are supported by retrieved documents
   - Link each factor to specific context evidence

4. AUDIT TRAIL:
   - Every claim must be traceable to source documents
   - If evidence is insufficient, say so explicitly

5. OUTPUT FORMAT: Respond with a single JSON object with:
   - risk_level: "low", "medium", or "high"
   - key_risk_factors: list of strings
   - policy_references: list of strings (only those in context)
   - recommended_action: "approve", "block", or "review"
   - confidence: number from 0.0 to 1.0
   - grounding_notes: how each claim is supported by context

Inventing policies or risk factors is a critical failure."#;

/// Fill the user prompt with a transaction's JSON and the passage texts,
/// one passage per line.
pub fn render_user_prompt(transaction_json: &str, passages: &[ContextPassage]) -> String {
    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Transaction:
{transaction_json}

Context Documents (policies and historical cases):
{context}

TASK: Assess the fraud risk for this transaction.

IMPORTANT:
- Use ONLY information from the context documents above
- ONLY cite policies that appear in the context
- If information is missing from context, state \"Information not in context\"

Assessment (respond in valid JSON):"
    )
}
