//! Embedding-based grounding.

use async_trait::async_trait;
use thiserror::Error;

use super::{GroundingError, GroundingMethod, GroundingStrategy, ReferenceVerdict};
use crate::types::ContextPassage;

/// Errors from an embedding backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// The backend cannot be reached or refused the request.
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the response was unusable.
    #[error("embedding failed: {0}")]
    Failed(String),
}

/// Black-box embedding backend. Usually remote and slow, so both calls
/// are async.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of passages, one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Cosine similarity of two vectors.
///
/// Zero-norm vectors, empty vectors and vectors of different lengths
/// score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    dot / denom
}

/// Grounding by maximum cosine similarity against passage embeddings.
pub struct SemanticGrounding<'a> {
    embedder: &'a dyn Embedder,
}

impl<'a> SemanticGrounding<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    /// A reference embedding, retried once as a document. `None` if both fail.
    async fn embed_reference(&self, reference: &str) -> Option<Vec<f32>> {
        match self.embedder.embed_query(reference).await {
            Ok(vector) => Some(vector),
            Err(_) => self
                .embedder
                .embed_documents(&[reference.to_string()])
                .await
                .ok()
                .and_then(|mut vectors| vectors.pop()),
        }
    }
}

#[async_trait]
impl<'a> GroundingStrategy for SemanticGrounding<'a> {
    fn method(&self) -> GroundingMethod {
        GroundingMethod::Semantic
    }

    async fn verify(
        &self,
        references: &[String],
        passages: &[ContextPassage],
        threshold: f64,
    ) -> Result<Vec<ReferenceVerdict>, GroundingError> {
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let passage_vectors = self.embedder.embed_documents(&texts).await?;

        let mut verdicts = Vec::with_capacity(references.len());
        for reference in references {
            let best_score = match self.embed_reference(reference).await {
                Some(vector) => passage_vectors
                    .iter()
                    .map(|passage| cosine_similarity(&vector, passage))
                    .fold(0.0, f64::max),
                None => 0.0,
            };

            verdicts.push(ReferenceVerdict {
                reference: reference.clone(),
                best_score,
                grounded: best_score >= threshold,
                method: GroundingMethod::Semantic,
            });
        }

        Ok(verdicts)
    }
}
