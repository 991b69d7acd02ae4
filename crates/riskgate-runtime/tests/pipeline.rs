//! Whole-pipeline behaviour against in-process collaborators.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use riskgate_core::{check_consistency, Action, Embedder, EmbeddingError, RiskLevel};
use riskgate_runtime::{
    AuditRecord, ChatMessage, CompletionConfig, CompletionResponse, DailyJsonlSink,
    GenerationProvider, ProviderError, RiskAssessor, RuntimeConfig, StaticRetriever, TokenUsage,
    Transaction,
};

/// Replies according to the transaction id found in the user prompt.
struct RoutingProvider {
    replies: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl GenerationProvider for RoutingProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let user = messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let reply = self
            .replies
            .iter()
            .find(|(id, _)| user.contains(*id))
            .map(|(_, reply)| *reply)
            .unwrap_or("no opinion");

        Ok(CompletionResponse {
            content: reply.to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
            model: "routing".to_string(),
            stop_reason: Some("stop".to_string()),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "routing"
    }
}

struct OfflineEmbedder;

#[async_trait]
impl Embedder for OfflineEmbedder {
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("model not downloaded".to_string()))
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("model not downloaded".to_string()))
    }
}

const HIGH_BLOCK: &str = r#"```json
{
  "risk_level": "high",
  "key_risk_factors": ["amount 14,000 EUR", "card not present"],
  "policy_references": ["Section 4.2: Block card-not-present purchases above 10,000 EUR", "Section 9.9 Advanced Risk Model"],
  "recommended_action": "block",
  "confidence": 0.93,
  "grounding_notes": "Section 4.2 is in context"
}
```"#;

const LOW_BLOCK_LOOSE: &str =
    "risk_level = low, recommended_action = block, confidence = 0.3, policy_references: [Section 1]";

fn transaction(value: serde_json::Value) -> anyhow::Result<Transaction> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("not an object: {other}"),
    }
}

fn assessor(audit_dir: &std::path::Path) -> anyhow::Result<RiskAssessor> {
    let config = RuntimeConfig::from_yaml(&format!(
        "audit:\n  enabled: true\n  directory: {}\n",
        audit_dir.display()
    ))?;

    let provider = RoutingProvider {
        replies: HashMap::from([("TX-HIGH", HIGH_BLOCK), ("TX-LOW", LOW_BLOCK_LOOSE)]),
    };

    let assessor = RiskAssessor::builder(config)
        .provider(Arc::new(provider))
        .retriever(Arc::new(StaticRetriever::from_texts([
            "Section 1: Verify cardholder identity for new devices.",
            "Section 4.2: Block card-not-present purchases above 10,000 EUR.",
        ])))
        .embedder(Arc::new(OfflineEmbedder))
        .build()?;

    Ok(assessor)
}

#[tokio::test]
async fn test_pipeline_end_to_end() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let assessor = assessor(dir.path())?;

    let transactions = vec![
        transaction(serde_json::json!({"id": "TX-HIGH", "amount": 14000, "currency": "EUR"}))?,
        transaction(serde_json::json!({"transaction_id": "TX-LOW", "amount": 12}))?,
        transaction(serde_json::json!({"amount": 1}))?,
    ];

    let outcomes = assessor
        .assess_many(&transactions)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    // Strict path, agreeing with policy, one of two references invented.
    let high = &outcomes[0];
    assert_eq!(high.assessment.risk_level, RiskLevel::High);
    assert_eq!(high.assessment.recommended_action, Action::Block);
    assert!(!high.assessment.validation_flag);
    assert!(!high.parse_source.is_fallback());
    assert_eq!(high.groundedness, 0.5);

    // Fallback path, model disagrees with policy.
    let low = &outcomes[1];
    assert!(low.parse_source.is_fallback());
    assert_eq!(low.assessment.risk_level, RiskLevel::Low);
    assert_eq!(low.assessment.recommended_action, Action::Approve);
    assert!(low.assessment.validation_flag);
    assert_eq!(low.assessment.policy_references, vec!["Section 1".to_string()]);
    assert_eq!(low.groundedness, 1.0);

    // Nothing usable at all.
    let unknown = &outcomes[2];
    assert_eq!(unknown.transaction_id, "unknown");
    assert!(unknown.risk_level_defaulted());
    assert_eq!(unknown.assessment.recommended_action, Action::Review);

    // One audit line per assessment, all in today's file.
    let files: Vec<_> = fs::read_dir(dir.path())?.collect::<Result<_, _>>()?;
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().to_string_lossy().into_owned();
    assert!(name.starts_with("llm_outputs_") && name.ends_with(".jsonl"));

    let contents = fs::read_to_string(files[0].path())?;
    let records: Vec<AuditRecord> = contents
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(records.len(), 3);

    let high_record = records
        .iter()
        .find(|r| r.transaction_id == "TX-HIGH")
        .ok_or_else(|| anyhow::anyhow!("missing TX-HIGH audit record"))?;
    assert_eq!(high_record.raw_text, HIGH_BLOCK);
    assert_eq!(high_record.final_assessment, high.assessment);

    Ok(())
}

#[tokio::test]
async fn test_repeated_runs_are_consistent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let assessor = assessor(dir.path())?;
    let tx = transaction(serde_json::json!({"id": "TX-LOW"}))?;

    let mut runs = Vec::new();
    for _ in 0..4 {
        runs.push(assessor.assess(&tx).await?.assessment);
    }

    let report = check_consistency(&runs);
    assert_eq!(report.consistency, 1.0);
    assert!(report.all_actions_same);
    assert_eq!(report.action_distribution.get(&Action::Approve), Some(&4));

    Ok(())
}

#[test]
fn test_daily_sink_path_naming() {
    let sink = DailyJsonlSink::new("reports/raw_responses");
    let ts = chrono::DateTime::parse_from_rfc3339("2024-12-31T23:30:00-02:00")
        .map(|t| t.with_timezone(&chrono::Utc));
    let ts = match ts {
        Ok(ts) => ts,
        Err(e) => panic!("bad timestamp: {e}"),
    };

    // 23:30 at UTC-2 is already the next day in UTC.
    assert_eq!(
        sink.path_for(&ts),
        std::path::PathBuf::from("reports/raw_responses/llm_outputs_20250101.jsonl")
    );
}
