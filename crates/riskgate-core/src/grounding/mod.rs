//! Groundedness scoring for cited policy references.
//!
//! A reference is *grounded* when it is supported by at least one retrieved
//! passage. The groundedness score is the fraction of references that are
//! grounded:
//!
//! - no references → 1.0 (nothing to contradict)
//! - references but no passages → 0.0
//!
//! Two strategies exist. [`SemanticGrounding`] compares embeddings by cosine
//! similarity and is used when an [`Embedder`] is configured.
//! [`LexicalGrounding`] uses substring containment and sequence similarity and
//! is used otherwise, or when the embedding backend fails at scoring time.
//!
//! Scoring is async because the embedding backend is an external service.
//! Without an embedder the returned future never suspends.

mod lexical;
mod semantic;
mod sequence;

pub use lexical::LexicalGrounding;
pub use semantic::{cosine_similarity, Embedder, EmbeddingError, SemanticGrounding};
pub use sequence::{similarity_ratio, SequenceMatcher};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Assessment, ContextPassage};

/// Default similarity threshold for a reference to count as grounded.
pub const DEFAULT_THRESHOLD: f64 = 0.75;

/// Errors raised by a grounding strategy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroundingError {
    #[error("semantic grounding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),
}

/// Which strategy produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundingMethod {
    Semantic,
    Lexical,
}

/// Outcome for a single cited reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVerdict {
    pub reference: String,
    /// Best similarity against any passage (or sentence, for lexical).
    pub best_score: f64,
    pub grounded: bool,
    pub method: GroundingMethod,
}

/// A way of deciding whether references are supported by passages.
#[async_trait]
pub trait GroundingStrategy: Send + Sync {
    fn method(&self) -> GroundingMethod;

    /// One verdict per reference, in input order.
    async fn verify(
        &self,
        references: &[String],
        passages: &[ContextPassage],
        threshold: f64,
    ) -> Result<Vec<ReferenceVerdict>, GroundingError>;
}

/// Per-reference verdicts plus the aggregate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingReport {
    /// Fraction of references grounded, in [0, 1].
    pub score: f64,
    pub method: GroundingMethod,
    pub verdicts: Vec<ReferenceVerdict>,
}

impl GroundingReport {
    /// References that no passage supports.
    pub fn ungrounded(&self) -> impl Iterator<Item = &str> {
        self.verdicts
            .iter()
            .filter(|v| !v.grounded)
            .map(|v| v.reference.as_str())
    }
}

/// Scores how well cited references are supported by retrieved context.
#[derive(Clone)]
pub struct GroundingValidator {
    embedder: Option<Arc<dyn Embedder>>,
    threshold: f64,
}

impl Default for GroundingValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GroundingValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundingValidator")
            .field("semantic", &self.embedder.is_some())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl GroundingValidator {
    /// A validator without an embedding backend (lexical only).
    pub fn new() -> Self {
        Self {
            embedder: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Enable the semantic path.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Threshold used by [`score_assessment`](Self::score_assessment).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The strategy that will be tried first.
    pub fn preferred_method(&self) -> GroundingMethod {
        if self.embedder.is_some() {
            GroundingMethod::Semantic
        } else {
            GroundingMethod::Lexical
        }
    }

    /// Fraction of `references` grounded in `passages`.
    pub async fn score(
        &self,
        references: &[String],
        passages: &[ContextPassage],
        threshold: f64,
    ) -> f64 {
        self.report(references, passages, threshold).await.score
    }

    /// Score an assessment's policy references with the configured threshold.
    pub async fn score_assessment(
        &self,
        assessment: &Assessment,
        passages: &[ContextPassage],
    ) -> f64 {
        self.score(&assessment.policy_references, passages, self.threshold)
            .await
    }

    /// Full per-reference breakdown.
    pub async fn report(
        &self,
        references: &[String],
        passages: &[ContextPassage],
        threshold: f64,
    ) -> GroundingReport {
        let method = self.preferred_method();

        if references.is_empty() {
            return GroundingReport {
                score: 1.0,
                method,
                verdicts: Vec::new(),
            };
        }

        if passages.is_empty() {
            let verdicts = references
                .iter()
                .map(|reference| ReferenceVerdict {
                    reference: reference.clone(),
                    best_score: 0.0,
                    grounded: false,
                    method,
                })
                .collect();
            return GroundingReport {
                score: 0.0,
                method,
                verdicts,
            };
        }

        let semantic = self
            .embedder
            .as_ref()
            .map(|embedder| SemanticGrounding::new(embedder.as_ref()));
        let strategy: &dyn GroundingStrategy = match &semantic {
            Some(semantic) => semantic,
            None => &LexicalGrounding,
        };

        let verdicts = match strategy.verify(references, passages, threshold).await {
            Ok(verdicts) => verdicts,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    failed = ?strategy.method(),
                    "Falling back to lexical grounding"
                );
                LexicalGrounding.verify_all(references, passages, threshold)
            }
        };

        let grounded = verdicts.iter().filter(|v| v.grounded).count();
        let score = grounded as f64 / verdicts.len() as f64;
        let method = verdicts.first().map(|v| v.method).unwrap_or(method);

        GroundingReport {
            score,
            method,
            verdicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    /// Bag-of-letters embedding: deterministic and good enough to tell
    /// near-identical text from unrelated text.
    struct LetterEmbedder;

    fn letters(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 26];
        for c in text.to_lowercase().chars() {
            if c.is_ascii_lowercase() {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        v
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| letters(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(letters(text))
        }
    }

    /// Answers after a timer, like a remote embedding service.
    struct RemoteEmbedder {
        latency: Duration,
    }

    #[async_trait]
    impl Embedder for RemoteEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            tokio::time::sleep(self.latency).await;
            Ok(texts.iter().map(|t| letters(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            tokio::time::sleep(self.latency).await;
            Ok(letters(text))
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("connection refused".to_string()))
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("connection refused".to_string()))
        }
    }

    /// Documents embed fine, single queries do not.
    struct QueryOnlyFails;

    #[async_trait]
    impl Embedder for QueryOnlyFails {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| letters(t)).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Failed("query endpoint disabled".to_string()))
        }
    }

    fn policy_passages() -> Vec<ContextPassage> {
        vec![
            ContextPassage::new("Section 4.2: Block card-not-present purchases above 10,000 EUR."),
            ContextPassage::new("Section 7: Escalate new-device logins from high-risk countries."),
        ]
    }

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_no_references_is_fully_grounded() {
        let validator = GroundingValidator::new();
        assert_eq!(validator.score(&[], &policy_passages(), 0.75).await, 1.0);
        assert_eq!(validator.score(&[], &[], 0.75).await, 1.0);
    }

    #[tokio::test]
    async fn test_no_passages_is_ungrounded() {
        let validator = GroundingValidator::new();
        let report = validator.report(&refs(&["Section 4.2"]), &[], 0.75).await;
        assert_eq!(report.score, 0.0);
        assert_eq!(report.ungrounded().collect::<Vec<_>>(), vec!["Section 4.2"]);
    }

    #[tokio::test]
    async fn test_lexical_half_grounded() {
        let validator = GroundingValidator::new();
        let report = validator
            .report(
                &refs(&["Section 4.2", "Quantum Fraud Accord 2031"]),
                &policy_passages(),
                0.75,
            )
            .await;

        assert_eq!(report.method, GroundingMethod::Lexical);
        assert_eq!(report.score, 0.5);
        assert!(report.verdicts[0].grounded);
        assert!(!report.verdicts[1].grounded);
    }

    #[tokio::test]
    async fn test_semantic_path_used_with_embedder() {
        let validator = GroundingValidator::new().with_embedder(Arc::new(LetterEmbedder));
        let passages = policy_passages();
        let report = validator
            .report(&[passages[1].text.clone()], &passages, 0.99)
            .await;

        assert_eq!(validator.preferred_method(), GroundingMethod::Semantic);
        assert_eq!(report.method, GroundingMethod::Semantic);
        assert_eq!(report.score, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_embedder_is_awaited() {
        let validator = GroundingValidator::new().with_embedder(Arc::new(RemoteEmbedder {
            latency: Duration::from_millis(250),
        }));
        let passages = policy_passages();
        let references = vec![passages[0].text.clone(), "Quantum Fraud Accord".to_string()];

        let started = tokio::time::Instant::now();
        let report = validator.report(&references, &passages, 0.99).await;

        // One batch for the passages, one query per reference.
        assert!(started.elapsed() >= Duration::from_millis(750));
        assert_eq!(report.method, GroundingMethod::Semantic);
        assert_eq!(report.score, 0.5);
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_to_lexical() {
        let validator = GroundingValidator::new().with_embedder(Arc::new(DownEmbedder));
        let report = validator
            .report(&refs(&["Section 7"]), &policy_passages(), 0.75)
            .await;

        assert_eq!(report.method, GroundingMethod::Lexical);
        assert_eq!(report.score, 1.0);
    }

    #[tokio::test]
    async fn test_query_failure_retries_as_document() {
        let validator = GroundingValidator::new().with_embedder(Arc::new(QueryOnlyFails));
        let passages = policy_passages();
        let report = validator
            .report(&[passages[0].text.clone()], &passages, 0.99)
            .await;

        assert_eq!(report.method, GroundingMethod::Semantic);
        assert_eq!(report.score, 1.0);
    }

    #[tokio::test]
    async fn test_strategies_report_their_method() {
        let lexical: &dyn GroundingStrategy = &LexicalGrounding;
        assert_eq!(lexical.method(), GroundingMethod::Lexical);

        let verdicts = lexical
            .verify(&refs(&["Section 7"]), &policy_passages(), 0.75)
            .await
            .unwrap();
        assert!(verdicts.iter().all(|v| v.method == GroundingMethod::Lexical));

        let embedder = LetterEmbedder;
        let semantic: &dyn GroundingStrategy = &SemanticGrounding::new(&embedder);
        assert_eq!(semantic.method(), GroundingMethod::Semantic);
    }

    #[tokio::test]
    async fn test_score_assessment_uses_configured_threshold() {
        use crate::types::{Action, RiskLevel};

        let assessment = Assessment::new(RiskLevel::High, Action::Block, 0.9)
            .with_policy_references(["section 4.2: block card-not-present"]);

        let strict = GroundingValidator::new().with_threshold(1.0);
        assert_eq!(strict.score_assessment(&assessment, &policy_passages()).await, 1.0);
    }

    proptest! {
        #[test]
        fn prop_score_is_bounded(
            references in proptest::collection::vec("[a-z ]{0,20}", 0..5),
            texts in proptest::collection::vec("[a-z .]{0,40}", 0..4),
            threshold in 0.0f64..=1.0,
        ) {
            let passages: Vec<ContextPassage> = texts.into_iter().map(ContextPassage::new).collect();
            let score = futures::executor::block_on(
                GroundingValidator::new().score(&references, &passages, threshold),
            );
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_verbatim_substring_is_grounded(
            prefix in "[a-zA-Zα-ωΑ-Ωа-яА-ЯÀ-ÖØ-öø-ÿ .]{0,20}",
            needle in "[a-zA-Zα-ωΑ-Ωа-яА-ЯÀ-ÖØ-öø-ÿİẞ]{1,20}",
            suffix in "[a-zA-Zα-ωΑ-Ωа-яА-ЯÀ-ÖØ-öø-ÿ .]{0,20}",
            threshold in 0.0f64..=1.0,
        ) {
            let passages = vec![ContextPassage::new(format!("{prefix}{needle}{suffix}"))];
            let score = futures::executor::block_on(
                GroundingValidator::new().score(&[needle], &passages, threshold),
            );
            prop_assert_eq!(score, 1.0);
        }
    }
}
