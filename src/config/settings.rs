// src/config/settings.rs
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::str::FromStr;

use crate::risk::keywords::{KeywordMatcher, DEFAULT_CRISIS_KEYWORDS, DEFAULT_HELP_PHRASES};
use crate::risk::RiskThresholds;

#[derive(Debug, Clone)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub phone_number: String,
    pub messaging_service_sid: String,
    pub workspace_sid: String,
    pub workflow_sid: String,
    pub conversations_service_sid: String,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub base_url: String,
    pub webhook_base_url: String,
    pub twilio: TwilioSettings,
    pub openai_api_key: Option<String>,
    pub risk_classification_model: String,
    pub llm_model: String,
    pub thresholds: RiskThresholds,
    pub crisis_keywords: KeywordMatcher,
    pub help_phrases: KeywordMatcher,
    pub crisis_response_timeout_minutes: u32,
    /// How long a webhook event id stays claimed.
    pub event_dedup_ttl_secs: u64,
    pub metrics_enabled: bool,
    pub log_level: String,
    /// Interval of the built-in check-in ticker; `None` leaves it to an external cron.
    pub checkin_scheduler_secs: Option<u64>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup. Used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let twilio = TwilioSettings {
            account_sid: env.required("TWILIO_ACCOUNT_SID")?,
            auth_token: env.required("TWILIO_AUTH_TOKEN")?,
            phone_number: env.required("TWILIO_PHONE_NUMBER")?,
            messaging_service_sid: env.required("TWILIO_MESSAGING_SERVICE_SID")?,
            workspace_sid: env.required("TWILIO_WORKSPACE_SID")?,
            workflow_sid: env.required("TWILIO_WORKFLOW_SID")?,
            conversations_service_sid: env.required("TWILIO_CONVERSATIONS_SERVICE_SID")?,
        };

        let base_url = env.or("BASE_URL", "https://yourapp.com");
        let webhook_base_url = env.or("WEBHOOK_BASE_URL", "https://yourapp.com/api");

        let thresholds = RiskThresholds::new(
            env.parse("RISK_THRESHOLD_HIGH", 0.8f32)?,
            env.parse("RISK_THRESHOLD_MEDIUM", 0.5f32)?,
        );

        let crisis_keywords =
            KeywordMatcher::from_csv(&env.or("CRISIS_KEYWORDS", DEFAULT_CRISIS_KEYWORDS));
        let help_phrases = match env.get("HELP_PHRASES") {
            Some(raw) => KeywordMatcher::from_csv(&raw),
            None => KeywordMatcher::new(DEFAULT_HELP_PHRASES),
        };

        let checkin_scheduler_secs = match env.get("CHECKIN_SCHEDULER_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("CHECKIN_SCHEDULER_SECS={raw:?}"))?;
                (secs > 0).then_some(secs)
            }
            None => None,
        };

        Ok(Self {
            environment: env.or("ENVIRONMENT", "development"),
            base_url: base_url.trim_end_matches('/').to_string(),
            webhook_base_url: webhook_base_url.trim_end_matches('/').to_string(),
            twilio,
            openai_api_key: env.get("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            risk_classification_model: env.or("RISK_CLASSIFICATION_MODEL", "gpt-4"),
            llm_model: env.or("LLM_MODEL", "gpt-4"),
            thresholds,
            crisis_keywords,
            help_phrases,
            crisis_response_timeout_minutes: env.parse("CRISIS_RESPONSE_TIMEOUT_MINUTES", 5u32)?,
            event_dedup_ttl_secs: env.parse("EVENT_DEDUP_TTL_SECS", 86_400u64)?,
            metrics_enabled: env.flag("METRICS_ENABLED"),
            log_level: env.or("LOG_LEVEL", "INFO"),
            checkin_scheduler_secs,
        })
    }

    /// Deterministic settings with placeholder vendor credentials.
    pub fn for_tests() -> Self {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ENVIRONMENT", "test"),
            ("BASE_URL", "https://arc.test"),
            ("WEBHOOK_BASE_URL", "https://arc.test/api"),
            ("TWILIO_ACCOUNT_SID", "ACtest"),
            ("TWILIO_AUTH_TOKEN", "token"),
            ("TWILIO_PHONE_NUMBER", "+15550000000"),
            ("TWILIO_MESSAGING_SERVICE_SID", "MGtest"),
            ("TWILIO_WORKSPACE_SID", "WStest"),
            ("TWILIO_WORKFLOW_SID", "WWtest"),
            ("TWILIO_CONVERSATIONS_SERVICE_SID", "IStest"),
        ]);
        Self::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .expect("test settings are complete")
    }

    /// Absolute URL of one of our webhooks, e.g. `/voice/gather`.
    pub fn webhook_url(&self, path: &str) -> String {
        format!("{}/{}", self.webhook_base_url, path.trim_start_matches('/'))
    }

    /// Media stream endpoint referenced from voice TwiML.
    pub fn voice_stream_url(&self, session_id: &str) -> String {
        let host = self
            .base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        format!("wss://{host}/ws/voice/{session_id}")
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing {key} env var"))
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {key}={raw:?}")),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).as_deref().map(str::trim),
            Some("1") | Some("true") | Some("TRUE") | Some("yes")
        )
    }
}
