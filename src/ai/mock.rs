use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;

use super::{ChatPurpose, ChatRequest, LlmClient, LlmFuture};

const DEFAULT_RISK: &str =
    r#"{"risk_score": 0.2, "risk_level": "low", "reasoning": "mock", "intent": "logistics"}"#;
const DEFAULT_REPLY: &str = r#"{"response": "Thanks for checking in. Try three slow breaths with me right now.", "coping_suggestion": "box breathing", "resource_id": null}"#;

/// Deterministic stand-in for tests and `AI_TEST_MODE=mock`.
pub struct MockLlm {
    risk_content: Mutex<String>,
    reply_content: Mutex<String>,
    failing: AtomicBool,
    risk_calls: AtomicUsize,
    reply_calls: AtomicUsize,
    last_user_prompt: Mutex<Option<String>>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            risk_content: Mutex::new(DEFAULT_RISK.to_string()),
            reply_content: Mutex::new(DEFAULT_REPLY.to_string()),
            failing: AtomicBool::new(false),
            risk_calls: AtomicUsize::new(0),
            reply_calls: AtomicUsize::new(0),
            last_user_prompt: Mutex::new(None),
        }
    }

    pub fn with_risk(self, score: f32, level: &str, intent: &str) -> Self {
        self.set_risk_content(format!(
            r#"{{"risk_score": {score}, "risk_level": "{level}", "reasoning": "mock", "intent": "{intent}"}}"#
        ));
        self
    }

    pub fn with_reply(self, text: &str) -> Self {
        let body = serde_json::json!({ "response": text, "coping_suggestion": null, "resource_id": null });
        *lock(&self.reply_content) = body.to_string();
        self
    }

    /// Reply that names a catalogue entry.
    pub fn with_suggestion(self, text: &str, resource_id: &str) -> Self {
        let body = serde_json::json!({ "response": text, "coping_suggestion": null, "resource_id": resource_id });
        *lock(&self.reply_content) = body.to_string();
        self
    }

    /// Raw content returned for the next classification prompts.
    pub fn set_risk_content(&self, content: impl Into<String>) {
        *lock(&self.risk_content) = content.into();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn risk_calls(&self) -> usize {
        self.risk_calls.load(Ordering::SeqCst)
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        lock(&self.last_user_prompt).clone()
    }
}

impl LlmClient for MockLlm {
    fn complete<'a>(&'a self, req: &'a ChatRequest) -> LlmFuture<'a, String> {
        let content = match req.purpose {
            ChatPurpose::RiskClassification => {
                self.risk_calls.fetch_add(1, Ordering::SeqCst);
                lock(&self.risk_content).clone()
            }
            ChatPurpose::Reply => {
                self.reply_calls.fetch_add(1, Ordering::SeqCst);
                lock(&self.reply_content).clone()
            }
        };
        *lock(&self.last_user_prompt) = Some(req.user.clone());
        let failing = self.failing.load(Ordering::SeqCst);
        Box::pin(async move {
            if failing {
                Err(anyhow!("mock failure"))
            } else {
                Ok(content)
            }
        })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
