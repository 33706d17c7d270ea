use std::sync::Arc;

use anyhow::Result;

use crate::ai::{build_client, DynLlmClient, ReplyGenerator};
use crate::config::Settings;
use crate::resources::default_resources;
use crate::risk::{EscalationPolicy, RiskClassifier};
use crate::store::{MemoryStore, Store};
use crate::telephony::{DynTelephony, TwilioClient};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub telephony: DynTelephony,
    pub classifier: Arc<RiskClassifier>,
    pub policy: Arc<EscalationPolicy>,
    pub replies: Arc<ReplyGenerator>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        llm: DynLlmClient,
        telephony: DynTelephony,
    ) -> Self {
        let classifier = RiskClassifier::new(
            settings.crisis_keywords.clone(),
            settings.thresholds,
            llm.clone(),
            settings.risk_classification_model.clone(),
        );
        let policy = EscalationPolicy::new(settings.thresholds, settings.help_phrases.clone());
        let replies = ReplyGenerator::new(llm, settings.llm_model.clone());
        Self {
            settings: Arc::new(settings),
            store,
            telephony,
            classifier: Arc::new(classifier),
            policy: Arc::new(policy),
            replies: Arc::new(replies),
        }
    }

    /// Production wiring: in-memory store seeded with the resource catalog,
    /// the configured language model and Twilio.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(
            MemoryStore::new(settings.event_dedup_ttl_secs).with_resources(default_resources()),
        );
        let llm = build_client(&settings);
        let telephony: DynTelephony = Arc::new(TwilioClient::new(
            settings.twilio.clone(),
            settings.webhook_base_url.clone(),
        )?);
        Ok(Self::new(settings, store, llm, telephony))
    }
}
