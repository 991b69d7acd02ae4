//! End-to-end assessment of transactions.
//!
//! For each transaction the assessor:
//! 1. Retrieves context passages (query = the transaction's compact JSON)
//! 2. Asks the generation provider for an assessment, under a timeout
//! 3. Parses the untrusted response (never fails)
//! 4. Reconciles the action with the decision policy (deterministic)
//! 5. Appends an audit record on the blocking pool (failures are logged,
//!    not raised)
//! 6. Scores how well the cited policies are grounded in the context,
//!    awaiting the embedding backend when one is configured
//!
//! Only retrieval and generation failures reach the caller.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{Map, Value as JsonValue};

use riskgate_core::{
    Assessment, AssessmentReconciler, ContextPassage, Embedder, GroundingValidator, ParseSource,
    RawResponse, StructuredResponseParser,
};

use crate::audit::{AuditRecord, AuditSink, DailyJsonlSink, NullAuditSink};
use crate::config::RuntimeConfig;
use crate::prompts::{render_user_prompt, SYSTEM_PROMPT};
use crate::providers::{ChatMessage, GenerationProvider, ProviderRegistry, TokenUsage};
use crate::retrieval::Retriever;
use crate::RuntimeError;

/// A transaction as received: an arbitrary JSON object.
pub type Transaction = Map<String, JsonValue>;

/// Identifier used for audit records: `id`, then `transaction_id`, else
/// `"unknown"`. Numeric ids are rendered as text.
pub fn transaction_id(transaction: &Transaction) -> String {
    ["id", "transaction_id"]
        .iter()
        .find_map(|key| match transaction.get(*key) {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Everything produced for one transaction.
#[derive(Debug, Clone)]
pub struct AssessmentOutcome {
    pub transaction_id: String,

    /// Final, policy-reconciled assessment.
    pub assessment: Assessment,

    /// Passages the model was shown.
    pub context: Vec<ContextPassage>,

    /// Fraction of policy references grounded in `context`.
    pub groundedness: f64,

    /// Whether the response decoded strictly or was recovered.
    pub parse_source: ParseSource,

    pub usage: TokenUsage,
}

impl AssessmentOutcome {
    /// True when the model's risk level could not be read and the safe
    /// default was used instead.
    pub fn risk_level_defaulted(&self) -> bool {
        self.parse_source.defaulted("risk_level")
    }
}

/// Runs the assessment pipeline.
pub struct RiskAssessor {
    provider: Arc<dyn GenerationProvider>,
    retriever: Arc<dyn Retriever>,
    audit: Arc<dyn AuditSink>,
    parser: StructuredResponseParser,
    reconciler: AssessmentReconciler,
    grounding: GroundingValidator,
    config: RuntimeConfig,
}

impl std::fmt::Debug for RiskAssessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskAssessor")
            .field("provider", &self.provider.name())
            .field("grounding", &self.grounding)
            .field("config", &self.config)
            .finish()
    }
}

impl RiskAssessor {
    pub fn builder(config: RuntimeConfig) -> RiskAssessorBuilder {
        RiskAssessorBuilder::new(config)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Assess one transaction.
    pub async fn assess(&self, transaction: &Transaction) -> Result<AssessmentOutcome, RuntimeError> {
        let transaction_id = transaction_id(transaction);
        let transaction_json = JsonValue::Object(transaction.clone()).to_string();

        let context = self
            .retriever
            .search(&transaction_json, self.config.retrieval.k)
            .await?;

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(render_user_prompt(&transaction_json, &context)),
        ];
        let completion_config = self.config.generation.completion_config();
        let timeout = completion_config.timeout;

        let response = match tokio::time::timeout(
            timeout,
            self.provider.complete(messages, &completion_config),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    provider = self.provider.name(),
                    error = %e,
                    "Generation failed"
                );
                return Err(RuntimeError::Provider(e));
            }
            Err(_) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    provider = self.provider.name(),
                    timeout = ?timeout,
                    "Generation timed out"
                );
                return Err(RuntimeError::Timeout(timeout));
            }
        };

        let raw_text = response.content;
        let parsed = self.parser.parse_detailed(&raw_text);

        let mut candidate = parsed.assessment;
        candidate.attach_raw_response(RawResponse {
            raw_text: raw_text.clone(),
            timestamp: Utc::now(),
            transaction_id: transaction_id.clone(),
        });

        let assessment = self.reconciler.reconcile(candidate);

        let record = AuditRecord::now(transaction_id.clone(), raw_text, assessment.clone());
        let sink = Arc::clone(&self.audit);
        match tokio::task::spawn_blocking(move || sink.append(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(transaction_id = %transaction_id, error = %e, "Failed to write audit record");
            }
            Err(e) => {
                tracing::warn!(transaction_id = %transaction_id, error = %e, "Audit writer task failed");
            }
        }

        let groundedness = self
            .grounding
            .score_assessment(&assessment, &context)
            .await;

        Ok(AssessmentOutcome {
            transaction_id,
            assessment,
            context,
            groundedness,
            parse_source: parsed.source,
            usage: response.usage,
        })
    }

    /// Assess transactions concurrently. Results are in input order and
    /// independent of each other.
    pub async fn assess_many(
        &self,
        transactions: &[Transaction],
    ) -> Vec<Result<AssessmentOutcome, RuntimeError>> {
        join_all(transactions.iter().map(|t| self.assess(t))).await
    }

    /// Human-readable rationale for an outcome's action.
    pub fn explain(&self, outcome: &AssessmentOutcome) -> String {
        self.reconciler.policy().explain(&outcome.assessment)
    }
}

/// Builds a [`RiskAssessor`].
///
/// Components not supplied are derived from the config: the provider from
/// `provider.kind` via [`ProviderRegistry::with_defaults`], the audit sink
/// from `audit`. A retriever is always required.
pub struct RiskAssessorBuilder {
    config: RuntimeConfig,
    provider: Option<Arc<dyn GenerationProvider>>,
    retriever: Option<Arc<dyn Retriever>>,
    audit: Option<Arc<dyn AuditSink>>,
    embedder: Option<Arc<dyn Embedder>>,
    registry: Option<ProviderRegistry>,
}

impl RiskAssessorBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            provider: None,
            retriever: None,
            audit: None,
            embedder: None,
            registry: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Enable semantic grounding.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Registry used to build the provider when none is supplied.
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<RiskAssessor, RuntimeError> {
        self.config.validate()?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => {
                let registry = self.registry.unwrap_or_else(ProviderRegistry::with_defaults);
                registry
                    .create(&self.config.provider.kind, &self.config.provider.options)
                    .map_err(|e| RuntimeError::ProviderNotConfigured(e.to_string()))?
            }
        };

        let retriever = self
            .retriever
            .ok_or(RuntimeError::MissingComponent("retriever"))?;

        let audit = match self.audit {
            Some(sink) => sink,
            None if self.config.audit.enabled => {
                Arc::new(DailyJsonlSink::new(self.config.audit.directory.clone()))
            }
            None => Arc::new(NullAuditSink),
        };

        let mut grounding = GroundingValidator::new().with_threshold(self.config.grounding.threshold);
        if let Some(embedder) = self.embedder {
            grounding = grounding.with_embedder(embedder);
        }

        Ok(RiskAssessor {
            provider,
            retriever,
            audit,
            parser: StructuredResponseParser::new(),
            reconciler: AssessmentReconciler::new(),
            grounding,
            config: self.config,
        })
    }
}
