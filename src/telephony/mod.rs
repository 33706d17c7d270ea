//! Vendor messaging, voice and task-routing seam.

pub mod outbox;
pub mod recording;
pub mod twilio;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::risk::RiskLevel;

pub use outbox::deliver;
pub use recording::RecordingTelephony;
pub use twilio::TwilioClient;

pub const WHATSAPP_PREFIX: &str = "whatsapp:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "SMS")]
    Sms,
    WhatsApp,
    Voice,
    Conversation,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "SMS",
            Channel::WhatsApp => "WhatsApp",
            Channel::Voice => "Voice",
            Channel::Conversation => "Conversation",
        }
    }

    /// Inbound text channel from a webhook `From` address.
    pub fn from_address(from: &str) -> Self {
        if from.to_ascii_lowercase().contains("whatsapp") {
            Channel::WhatsApp
        } else {
            Channel::Sms
        }
    }
}

/// `whatsapp:+1555…` → `+1555…`; plain numbers pass through trimmed.
pub fn strip_channel_prefix(address: &str) -> &str {
    let a = address.trim();
    match a.get(..WHATSAPP_PREFIX.len()) {
        Some(p) if p.eq_ignore_ascii_case(WHATSAPP_PREFIX) => &a[WHATSAPP_PREFIX.len()..],
        _ => a,
    }
}

/// A unit of work for the mentor routing queue.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub user_id: String,
    pub priority: u8,
    pub risk_level: RiskLevel,
    pub context: Value,
}

impl TaskRequest {
    /// Attributes document the routing workflow filters on.
    pub fn attributes(&self) -> Value {
        json!({
            "user_id": self.user_id,
            "risk_level": self.risk_level.as_str(),
            "priority": self.priority,
            "type": "mental_health_support",
            "context": self.context,
        })
    }
}

/// Every method returns the vendor sid of the created resource.
#[async_trait]
pub trait Telephony: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str, media_url: Option<&str>) -> Result<String>;
    async fn send_whatsapp(
        &self,
        to: &str,
        body: &str,
        template_sid: Option<&str>,
    ) -> Result<String>;
    async fn create_task(&self, task: &TaskRequest) -> Result<String>;
    async fn create_conversation(
        &self,
        user_phone: &str,
        mentor_identity: &str,
        task_sid: &str,
    ) -> Result<String>;
    async fn make_outbound_call(&self, to: &str, user_id: &str) -> Result<String>;
}

pub type DynTelephony = Arc<dyn Telephony>;
