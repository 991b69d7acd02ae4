//! Context retrieval.
//!
//! The similarity-search backend is a collaborator: it receives the
//! transaction's JSON as the query and returns the most relevant policy
//! excerpts and historical cases, best first.

use async_trait::async_trait;
use thiserror::Error;

use riskgate_core::ContextPassage;

/// Default number of passages to retrieve.
pub const DEFAULT_K: usize = 4;

/// Errors from a retrieval backend.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("retrieval failed: {0}")]
    Failed(String),
}

/// Similarity search over policy documents and historical cases.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` passages relevant to `query`, most relevant first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ContextPassage>, RetrievalError>;
}

/// Returns the same passages for every query.
///
/// Useful for fixed policy sets and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    passages: Vec<ContextPassage>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<ContextPassage>) -> Self {
        Self { passages }
    }

    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(ContextPassage::new).collect())
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<ContextPassage>, RetrievalError> {
        Ok(self.passages.iter().take(k).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_retriever_respects_k() {
        let retriever = StaticRetriever::from_texts(["Section 1", "Section 2", "Section 3"]);

        let passages = retriever.search("{}", 2).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text, "Section 1");
        assert_eq!(passages[1].text, "Section 2");
    }

    #[tokio::test]
    async fn test_static_retriever_fewer_than_k() {
        let retriever = StaticRetriever::from_texts(["only one"]);
        assert_eq!(retriever.search("{}", DEFAULT_K).await.unwrap().len(), 1);
    }
}
