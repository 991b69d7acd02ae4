//! Fuzzy-text grounding, used when no embedding backend is available.
//!
//! A reference is grounded if it appears verbatim (case-insensitively) in
//! the context, or if its similarity ratio against the whole context or
//! against any single sentence meets the threshold.
//!
//! Case folding is per character, so a substring of the raw context is
//! still a substring after folding.

use async_trait::async_trait;

use super::sequence::similarity_ratio;
use super::{GroundingError, GroundingMethod, GroundingStrategy, ReferenceVerdict};
use crate::types::ContextPassage;

/// Substring and sequence-similarity grounding.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalGrounding;

impl LexicalGrounding {
    pub fn new() -> Self {
        Self
    }

    /// Score one reference against prepared context.
    fn score_reference(&self, reference: &str, context_text: &str, sentences: &[&str]) -> f64 {
        let needle = fold_case(reference.trim());

        if context_text.contains(&needle) {
            return 1.0;
        }

        let whole = similarity_ratio(&needle, context_text);
        let best_sentence = sentences
            .iter()
            .map(|sentence| similarity_ratio(&needle, sentence))
            .fold(0.0, f64::max);

        whole.max(best_sentence)
    }

    /// Verify every reference. This path cannot fail.
    pub fn verify_all(
        &self,
        references: &[String],
        passages: &[ContextPassage],
        threshold: f64,
    ) -> Vec<ReferenceVerdict> {
        let context_text = joined_context(passages);

        if context_text.is_empty() {
            return references
                .iter()
                .map(|reference| ReferenceVerdict {
                    reference: reference.clone(),
                    best_score: 0.0,
                    grounded: false,
                    method: GroundingMethod::Lexical,
                })
                .collect();
        }

        let sentences: Vec<&str> = context_text.split('.').map(str::trim).collect();

        references
            .iter()
            .map(|reference| {
                let best_score = self.score_reference(reference, &context_text, &sentences);
                ReferenceVerdict {
                    reference: reference.clone(),
                    best_score,
                    grounded: best_score >= threshold,
                    method: GroundingMethod::Lexical,
                }
            })
            .collect()
    }
}

/// Lower-case each character on its own. `str::to_lowercase` maps a
/// word-final `Σ` to `ς`, which breaks containment between a fragment and
/// the text it was cut from.
fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Passage texts joined by a single space, case-folded.
fn joined_context(passages: &[ContextPassage]) -> String {
    let joined = passages
        .iter()
        .map(|p| p.text.as_str())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    fold_case(&joined)
}

#[async_trait]
impl GroundingStrategy for LexicalGrounding {
    fn method(&self) -> GroundingMethod {
        GroundingMethod::Lexical
    }

    async fn verify(
        &self,
        references: &[String],
        passages: &[ContextPassage],
        threshold: f64,
    ) -> Result<Vec<ReferenceVerdict>, GroundingError> {
        Ok(self.verify_all(references, passages, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passages(texts: &[&str]) -> Vec<ContextPassage> {
        texts.iter().map(|t| ContextPassage::new(*t)).collect()
    }

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_case_insensitive_containment() {
        let context = passages(&["Section 2.1: Transactions over EUR 5,000 require review."]);
        let verdicts = LexicalGrounding.verify_all(
            &refs(&["  section 2.1: TRANSACTIONS over eur 5,000 "]),
            &context,
            0.75,
        );

        assert!(verdicts[0].grounded);
        assert_eq!(verdicts[0].best_score, 1.0);
    }

    #[test]
    fn test_sentence_similarity_grounds_paraphrase() {
        let context = passages(&[
            "Velocity rule: more than five transactions in ten minutes is suspicious. Other text follows here",
        ]);
        let verdicts = LexicalGrounding.verify_all(
            &refs(&["velocity rule: more than 5 transactions in ten minutes is suspicious"]),
            &context,
            0.75,
        );

        assert!(verdicts[0].grounded);
        assert!(verdicts[0].best_score < 1.0);
    }

    #[test]
    fn test_invented_policy_is_not_grounded() {
        let context = passages(&["Section 1: Verify cardholder identity for new devices."]);
        let verdicts = LexicalGrounding.verify_all(&refs(&["Advanced Risk Model 9.9"]), &context, 0.75);

        assert!(!verdicts[0].grounded);
    }

    #[test]
    fn test_final_sigma_fragment_is_contained() {
        // Σ ends the fragment but not the word it was cut from.
        let context = passages(&["ΟΔΟΣΑ policy"]);
        let verdicts = LexicalGrounding.verify_all(&refs(&["ΟΔΟΣ"]), &context, 0.75);

        assert!(verdicts[0].grounded);
        assert_eq!(verdicts[0].best_score, 1.0);
    }

    #[test]
    fn test_fold_case_is_per_character() {
        assert_eq!(fold_case("ΟΔΟΣ"), "οδοσ");
        assert_eq!(fold_case("Section 4.2"), "section 4.2");
    }

    #[test]
    fn test_empty_context_text_grounds_nothing() {
        let verdicts = LexicalGrounding.verify_all(&refs(&["anything"]), &passages(&["", ""]), 0.0);
        assert!(!verdicts[0].grounded);
    }
}
