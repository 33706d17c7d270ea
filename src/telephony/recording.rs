//! In-memory `Telephony` that records every request. Used by tests and by
//! local runs without vendor credentials.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{Channel, TaskRequest, Telephony};

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: Channel,
    pub to: String,
    pub body: String,
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedConversation {
    pub sid: String,
    pub user_phone: String,
    pub mentor_identity: String,
    pub task_sid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCall {
    pub sid: String,
    pub to: String,
    pub user_id: String,
}

#[derive(Debug, Default)]
struct Log {
    messages: Vec<SentMessage>,
    tasks: Vec<(String, TaskRequest)>,
    conversations: Vec<CreatedConversation>,
    calls: Vec<PlacedCall>,
}

#[derive(Debug, Default)]
pub struct RecordingTelephony {
    log: Mutex<Log>,
    seq: AtomicU64,
    fail_messages: AtomicBool,
    fail_tasks: AtomicBool,
    fail_calls: AtomicBool,
}

impl RecordingTelephony {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tasks(&self, fail: bool) {
        self.fail_tasks.store(fail, Ordering::SeqCst);
    }

    pub fn fail_calls(&self, fail: bool) {
        self.fail_calls.store(fail, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.log().messages.clone()
    }

    pub fn messages_to(&self, to: &str) -> Vec<SentMessage> {
        self.log()
            .messages
            .iter()
            .filter(|m| m.to == to)
            .cloned()
            .collect()
    }

    pub fn tasks(&self) -> Vec<(String, TaskRequest)> {
        self.log().tasks.clone()
    }

    pub fn conversations(&self) -> Vec<CreatedConversation> {
        self.log().conversations.clone()
    }

    pub fn calls(&self) -> Vec<PlacedCall> {
        self.log().calls.clone()
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_sid(&self, prefix: &str) -> String {
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n:032x}")
    }

    fn record_message(&self, channel: Channel, to: &str, body: &str) -> Result<String> {
        if self.fail_messages.load(Ordering::SeqCst) {
            bail!("messaging unavailable");
        }
        let sid = self.next_sid("SM");
        self.log().messages.push(SentMessage {
            channel,
            to: to.to_string(),
            body: body.to_string(),
            sid: sid.clone(),
        });
        Ok(sid)
    }
}

#[async_trait]
impl Telephony for RecordingTelephony {
    async fn send_sms(&self, to: &str, body: &str, _media_url: Option<&str>) -> Result<String> {
        self.record_message(Channel::Sms, to, body)
    }

    async fn send_whatsapp(
        &self,
        to: &str,
        body: &str,
        _template_sid: Option<&str>,
    ) -> Result<String> {
        self.record_message(Channel::WhatsApp, to, body)
    }

    async fn create_task(&self, task: &TaskRequest) -> Result<String> {
        if self.fail_tasks.load(Ordering::SeqCst) {
            bail!("task routing unavailable");
        }
        let sid = self.next_sid("WT");
        self.log().tasks.push((sid.clone(), task.clone()));
        Ok(sid)
    }

    async fn create_conversation(
        &self,
        user_phone: &str,
        mentor_identity: &str,
        task_sid: &str,
    ) -> Result<String> {
        let sid = self.next_sid("CH");
        self.log().conversations.push(CreatedConversation {
            sid: sid.clone(),
            user_phone: user_phone.to_string(),
            mentor_identity: mentor_identity.to_string(),
            task_sid: task_sid.to_string(),
        });
        Ok(sid)
    }

    async fn make_outbound_call(&self, to: &str, user_id: &str) -> Result<String> {
        if self.fail_calls.load(Ordering::SeqCst) {
            bail!("voice unavailable");
        }
        let sid = self.next_sid("CA");
        self.log().calls.push(PlacedCall {
            sid: sid.clone(),
            to: to.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLevel;

    #[tokio::test]
    async fn records_and_fails_on_demand() {
        let t = RecordingTelephony::new();
        let sid = t.send_sms("+1555", "hi", None).await.unwrap();
        assert!(sid.starts_with("SM"));
        t.fail_messages(true);
        assert!(t.send_whatsapp("+1555", "again", None).await.is_err());
        assert_eq!(t.messages().len(), 1);

        let task = TaskRequest {
            user_id: "u".into(),
            priority: 5,
            risk_level: RiskLevel::Medium,
            context: serde_json::json!({}),
        };
        t.fail_tasks(true);
        assert!(t.create_task(&task).await.is_err());
        t.fail_tasks(false);
        assert!(t.create_task(&task).await.unwrap().starts_with("WT"));
    }
}
