//! Language-model adapter: provider abstraction, JSON contracts for the two
//! prompts we send, and client construction from settings.

pub mod mock;
pub mod openai;
pub mod prompts;
pub mod reply;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::config::Settings;

pub use mock::MockLlm;
pub use openai::OpenAiProvider;
pub use reply::{GeneratedReply, ReplyGenerator};

pub type LlmFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Which of our prompts a request belongs to. Providers ignore it; the mock
/// uses it to pick a canned answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPurpose {
    RiskClassification,
    Reply,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub purpose: ChatPurpose,
    pub model: String,
    pub system: &'static str,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat-completion backend. Returns the raw assistant content.
pub trait LlmClient: Send + Sync {
    fn complete<'a>(&'a self, req: &'a ChatRequest) -> LlmFuture<'a, String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLlmClient = Arc<dyn LlmClient>;

/// Always fails, so every caller lands on its fallback path.
pub struct DisabledClient;

impl LlmClient for DisabledClient {
    fn complete<'a>(&'a self, _req: &'a ChatRequest) -> LlmFuture<'a, String> {
        Box::pin(async { Err(anyhow!("language model disabled")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// * `AI_TEST_MODE=mock` returns a deterministic mock.
/// * No `OPENAI_API_KEY` returns a disabled client.
/// * Otherwise OpenAI chat completions.
pub fn build_client(settings: &Settings) -> DynLlmClient {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockLlm::new());
    }

    match settings.openai_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => match OpenAiProvider::new(key.to_string()) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                tracing::warn!(error = %e, "openai client init failed; AI disabled");
                Arc::new(DisabledClient)
            }
        },
        _ => {
            tracing::warn!("OPENAI_API_KEY not set; AI disabled");
            Arc::new(DisabledClient)
        }
    }
}

// ------------------------------------------------------------
// JSON contracts
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelRisk {
    pub risk_score: f32,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelReply {
    pub response: String,
    #[serde(default)]
    pub coping_suggestion: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
}

/// Models sometimes wrap JSON in prose or ```json fences; keep the outermost
/// object only.
pub fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

pub fn parse_model_json<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    let json = extract_json(content).ok_or_else(|| anyhow!("no JSON object in model output"))?;
    serde_json::from_str(json).context("decode model JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let raw = "```json\n{\"risk_score\": 0.4, \"risk_level\": \"low\"}\n```";
        let parsed: ModelRisk = parse_model_json(raw).unwrap();
        assert!((parsed.risk_score - 0.4).abs() < 1e-6);
        assert_eq!(parsed.risk_level.as_deref(), Some("low"));
        assert_eq!(parsed.intent, None);
    }

    #[test]
    fn rejects_prose_without_object() {
        let err = parse_model_json::<ModelRisk>("I cannot help with that").unwrap_err();
        assert!(err.to_string().contains("no JSON object"));
    }

    #[tokio::test]
    async fn disabled_client_errors() {
        let req = ChatRequest {
            purpose: ChatPurpose::Reply,
            model: "gpt-4".into(),
            system: "sys",
            user: "hi".into(),
            temperature: 0.7,
            max_tokens: 10,
        };
        assert!(DisabledClient.complete(&req).await.is_err());
    }
}
