//! Keyword scan first, one model call otherwise, fixed fallback on failure.

use serde::Serialize;
use tracing::{error, info, warn};

use super::{Intent, KeywordMatcher, RiskAssessment, RiskLevel, RiskSource, RiskThresholds};
use crate::ai::prompts::{risk_user_prompt, RISK_SYSTEM_PROMPT};
use crate::ai::{parse_model_json, ChatPurpose, ChatRequest, DynLlmClient, ModelRisk};
use crate::logging::preview;
use crate::metrics;

/// Extra facts forwarded to the model alongside the message.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifyContext {
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_interactions_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<&'static str>,
}

pub struct RiskClassifier {
    keywords: KeywordMatcher,
    thresholds: RiskThresholds,
    llm: DynLlmClient,
    model: String,
}

impl RiskClassifier {
    pub fn new(
        keywords: KeywordMatcher,
        thresholds: RiskThresholds,
        llm: DynLlmClient,
        model: impl Into<String>,
    ) -> Self {
        Self {
            keywords,
            thresholds,
            llm,
            model: model.into(),
        }
    }

    pub async fn classify(&self, text: &str, ctx: Option<&ClassifyContext>) -> RiskAssessment {
        let hits = self.keywords.scan(text);
        if !hits.is_empty() {
            warn!(
                keywords = ?hits,
                text_preview = %preview(text, 100),
                "crisis_keywords_detected"
            );
            let out = RiskAssessment::from_keywords(hits);
            metrics::record_risk(&out);
            return out;
        }

        let out = match self.ask_model(text, ctx).await {
            Ok(a) => {
                info!(
                    risk_score = a.score,
                    risk_level = a.level.as_str(),
                    intent = a.intent.as_str(),
                    reasoning = a.reasoning.as_deref().unwrap_or(""),
                    "risk_classified"
                );
                a
            }
            Err(e) => {
                error!(
                    provider = self.llm.provider_name(),
                    error = %e,
                    fallback_to = "medium",
                    "risk_classification_failed"
                );
                RiskAssessment::fallback()
            }
        };
        metrics::record_risk(&out);
        out
    }

    async fn ask_model(
        &self,
        text: &str,
        ctx: Option<&ClassifyContext>,
    ) -> anyhow::Result<RiskAssessment> {
        let ctx_json = ctx.map(serde_json::to_value).transpose()?;
        let req = ChatRequest {
            purpose: ChatPurpose::RiskClassification,
            model: self.model.clone(),
            system: RISK_SYSTEM_PROMPT,
            user: risk_user_prompt(text, ctx_json.as_ref()),
            temperature: 0.1,
            max_tokens: 200,
        };
        let content = self.llm.complete(&req).await?;
        let raw: ModelRisk = parse_model_json(&content)?;
        if !raw.risk_score.is_finite() {
            anyhow::bail!("non-finite risk score");
        }
        let score = raw.risk_score.clamp(0.0, 1.0);
        let level = raw
            .risk_level
            .as_deref()
            .and_then(RiskLevel::parse)
            .unwrap_or_else(|| self.thresholds.level_for(score));

        Ok(RiskAssessment {
            score,
            level,
            keywords: Vec::new(),
            intent: raw
                .intent
                .as_deref()
                .map(Intent::parse)
                .unwrap_or(Intent::Unknown),
            reasoning: raw.reasoning,
            source: RiskSource::Model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockLlm;
    use crate::risk::keywords::DEFAULT_CRISIS_KEYWORDS;
    use crate::risk::{FALLBACK_RISK_SCORE, KEYWORD_RISK_SCORE};
    use std::sync::Arc;

    fn classifier(llm: Arc<MockLlm>) -> RiskClassifier {
        RiskClassifier::new(
            KeywordMatcher::from_csv(DEFAULT_CRISIS_KEYWORDS),
            RiskThresholds::default(),
            llm,
            "gpt-4",
        )
    }

    #[tokio::test]
    async fn keyword_hit_skips_model() {
        let llm = Arc::new(MockLlm::new());
        let c = classifier(llm.clone());
        let a = c.classify("I want to kill myself", None).await;
        assert_eq!(a.level, RiskLevel::High);
        assert_eq!(a.score, KEYWORD_RISK_SCORE);
        assert_eq!(a.source, RiskSource::Keyword);
        assert_eq!(a.keywords, vec!["kill myself".to_string()]);
        assert_eq!(llm.risk_calls(), 0);
    }

    #[tokio::test]
    async fn model_score_is_used_and_clamped() {
        let llm = Arc::new(MockLlm::new().with_risk(1.7, "high", "craving"));
        let c = classifier(llm.clone());
        let a = c.classify("cravings are bad tonight", None).await;
        assert_eq!(a.score, 1.0);
        assert_eq!(a.level, RiskLevel::High);
        assert_eq!(a.intent, Intent::Craving);
        assert_eq!(a.source, RiskSource::Model);
        assert_eq!(llm.risk_calls(), 1);
    }

    #[tokio::test]
    async fn missing_level_is_derived_from_score() {
        let llm = Arc::new(MockLlm::new());
        llm.set_risk_content(r#"{"risk_score": 0.55}"#);
        let a = classifier(llm).classify("meh", None).await;
        assert_eq!(a.level, RiskLevel::Medium);
        assert_eq!(a.intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn garbage_output_falls_back_to_medium() {
        let llm = Arc::new(MockLlm::new());
        llm.set_risk_content("sorry, I can't do that");
        let a = classifier(llm).classify("hello", None).await;
        assert_eq!(a.source, RiskSource::Fallback);
        assert_eq!(a.level, RiskLevel::Medium);
        assert_eq!(a.score, FALLBACK_RISK_SCORE);
    }

    #[tokio::test]
    async fn context_is_forwarded_to_model() {
        let llm = Arc::new(MockLlm::new());
        let ctx = ClassifyContext {
            alias: "River".into(),
            recent_interactions_count: Some(2),
            channel: None,
        };
        classifier(llm.clone()).classify("hi", Some(&ctx)).await;
        let prompt = llm.last_user_prompt().unwrap();
        assert!(prompt.contains(r#""recent_interactions_count":2"#));
        assert!(!prompt.contains("channel"));
    }
}
