//! # riskgate-runtime
//!
//! The I/O side of riskgate: retrieval, generation, audit and the
//! assessment pipeline that ties them to `riskgate-core`.
//!
//! ## Important
//!
//! Everything that decides the outcome lives in `riskgate-core` and is
//! deterministic. This crate only fetches context, asks a model, and
//! records what happened.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use riskgate_runtime::{RiskAssessor, RuntimeConfig, StaticRetriever};
//!
//! let config = RuntimeConfig::from_yaml_file("riskgate.yaml")?;
//! let assessor = RiskAssessor::builder(config)
//!     .retriever(Arc::new(StaticRetriever::from_texts(policies)))
//!     .build()?;
//!
//! let outcome = assessor.assess(&transaction).await?;
//! println!("{}", assessor.explain(&outcome));
//! ```

use std::time::Duration;

use thiserror::Error;

pub mod assessor;
pub mod audit;
pub mod config;
pub mod prompts;
pub mod providers;
pub mod retrieval;

pub use assessor::{transaction_id, AssessmentOutcome, RiskAssessor, RiskAssessorBuilder, Transaction};
pub use audit::{AuditRecord, AuditSink, AuditWriteFailure, DailyJsonlSink, NullAuditSink};
pub use config::{ConfigError, RuntimeConfig};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, GenerationProvider, ProviderError,
    ProviderRegistry, TokenUsage,
};
pub use retrieval::{RetrievalError, Retriever, StaticRetriever};

/// Failures that prevent an assessment from being produced.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Assessor is missing a {0}")]
    MissingComponent(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Context retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Generation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
}
