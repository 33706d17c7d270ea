//! Supportive reply generation with level-based fallbacks.

use tracing::{error, info};

use super::prompts::{reply_user_prompt, ReplyContext, REPLY_SYSTEM_PROMPT};
use super::{parse_model_json, ChatPurpose, ChatRequest, DynLlmClient, ModelReply};
use crate::risk::{Intent, RiskLevel};
use crate::store::models::{CopingResource, Interaction};

/// SMS-friendly cap (three segments).
pub const MAX_REPLY_CHARS: usize = 480;

pub const FALLBACK_HIGH: &str = "I can hear you're going through a difficult time. You're not alone. Would you like me to connect you with a human mentor right now? In the meantime, try taking 5 deep breaths with me.";
pub const FALLBACK_MEDIUM: &str = "Thank you for sharing that with me. Your honesty takes courage. Let's focus on one small step you can take right now to take care of yourself.";
pub const FALLBACK_LOW: &str = "I appreciate you checking in. You're doing great by staying connected. What's one thing that's going well for you today?";

pub fn fallback_reply(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => FALLBACK_HIGH,
        RiskLevel::Medium => FALLBACK_MEDIUM,
        RiskLevel::Low => FALLBACK_LOW,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub text: String,
    pub resource_id: Option<String>,
    pub from_model: bool,
}

pub struct ReplyGenerator {
    llm: DynLlmClient,
    model: String,
}

impl ReplyGenerator {
    pub fn new(llm: DynLlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub async fn generate(
        &self,
        message: &str,
        alias: &str,
        level: RiskLevel,
        intent: Intent,
        recent: &[Interaction],
        resources: &[CopingResource],
    ) -> GeneratedReply {
        let catalog: Vec<(String, String, String)> = resources
            .iter()
            .filter(|r| r.is_active)
            .map(|r| (r.id.clone(), r.category.clone(), r.title.clone()))
            .collect();
        let ctx = ReplyContext {
            alias,
            risk_level: level.as_str(),
            intent: intent.as_str(),
            recent,
            resources: &catalog,
        };
        let req = ChatRequest {
            purpose: ChatPurpose::Reply,
            model: self.model.clone(),
            system: REPLY_SYSTEM_PROMPT,
            user: reply_user_prompt(message, &ctx),
            temperature: 0.7,
            max_tokens: 300,
        };

        let parsed = match self.llm.complete(&req).await {
            Ok(content) => parse_model_json::<ModelReply>(&content),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(reply) => {
                let text = sanitize_reply(&reply.response);
                if text.is_empty() {
                    return self.fallback(level, "empty model response");
                }
                let resource_id = reply.resource_id.filter(|id| catalog.iter().any(|(c, _, _)| c == id));
                info!(
                    provider = self.llm.provider_name(),
                    response_length = text.chars().count(),
                    resource_suggested = resource_id.is_some(),
                    "response_generated"
                );
                GeneratedReply {
                    text,
                    resource_id,
                    from_model: true,
                }
            }
            Err(e) => self.fallback(level, &e.to_string()),
        }
    }

    fn fallback(&self, level: RiskLevel, why: &str) -> GeneratedReply {
        error!(
            provider = self.llm.provider_name(),
            error = why,
            risk_level = level.as_str(),
            "response_generation_failed"
        );
        GeneratedReply {
            text: fallback_reply(level).to_string(),
            resource_id: None,
            from_model: false,
        }
    }
}

/// Single line, collapsed whitespace, at most [`MAX_REPLY_CHARS`] characters.
pub fn sanitize_reply(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_REPLY_CHARS {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(MAX_REPLY_CHARS - 1).collect();
    if let Some(idx) = out.rfind(' ') {
        out.truncate(idx);
    }
    out.push('…');
    out
}
