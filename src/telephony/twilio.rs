use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{strip_channel_prefix, TaskRequest, Telephony, WHATSAPP_PREFIX};
use crate::config::TwilioSettings;

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const TASKROUTER_BASE: &str = "https://taskrouter.twilio.com/v1";
const CONVERSATIONS_BASE: &str = "https://conversations.twilio.com/v1";

/// Roots of the three REST products we talk to.
#[derive(Debug, Clone)]
pub struct BaseUrls {
    pub api: String,
    pub taskrouter: String,
    pub conversations: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            api: API_BASE.to_string(),
            taskrouter: TASKROUTER_BASE.to_string(),
            conversations: CONVERSATIONS_BASE.to_string(),
        }
    }
}

/// Twilio REST over form posts with basic auth.
#[derive(Clone)]
pub struct TwilioClient {
    creds: TwilioSettings,
    webhook_base_url: String,
    bases: BaseUrls,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    backoff: Duration,
}

#[derive(Deserialize)]
struct Created {
    sid: String,
}

impl TwilioClient {
    pub fn new(creds: TwilioSettings, webhook_base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("arc-companion/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()
            .context("building Twilio HTTP client")?;
        Ok(Self {
            creds,
            webhook_base_url: webhook_base_url.into(),
            bases: BaseUrls::default(),
            client,
            timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff: Duration::from_millis(500),
        })
    }

    /// Point the client at other hosts (regional edges, a local stand-in).
    pub fn with_base_urls(mut self, bases: BaseUrls) -> Self {
        self.bases = bases;
        self
    }

    /// First retry delay; doubles per attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// POST a form and return the `sid` of the created resource.
    /// Network errors, 5xx and 429 are retried with exponential backoff.
    async fn post_form(&self, what: &str, url: &str, form: &[(&str, String)]) -> Result<String> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(url)
                .basic_auth(&self.creds.account_sid, Some(&self.creds.auth_token))
                .timeout(self.timeout)
                .form(form)
                .send()
                .await;

            let retryable = match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_success() {
                        let created: Created = rsp
                            .json()
                            .await
                            .with_context(|| format!("{what}: decoding response"))?;
                        return Ok(created.sid);
                    }
                    let transient =
                        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    let err = anyhow!("{what}: HTTP {status}");
                    if !transient {
                        return Err(err);
                    }
                    err
                }
                Err(e) => anyhow!("{what}: request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(retryable);
            }
            tracing::debug!(what, attempt, error = %retryable, "twilio_retry");
            tokio::time::sleep(self.backoff * (1u32 << (attempt - 1))).await;
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.bases.api, self.creds.account_sid)
    }
}

#[async_trait]
impl Telephony for TwilioClient {
    async fn send_sms(&self, to: &str, body: &str, media_url: Option<&str>) -> Result<String> {
        let mut form = vec![
            ("MessagingServiceSid", self.creds.messaging_service_sid.clone()),
            ("To", strip_channel_prefix(to).to_string()),
            ("Body", body.to_string()),
        ];
        if let Some(m) = media_url {
            form.push(("MediaUrl", m.to_string()));
        }
        self.post_form("send_sms", &self.messages_url(), &form).await
    }

    async fn send_whatsapp(
        &self,
        to: &str,
        body: &str,
        template_sid: Option<&str>,
    ) -> Result<String> {
        let mut form = vec![
            (
                "From",
                format!("{WHATSAPP_PREFIX}{}", self.creds.phone_number),
            ),
            ("To", format!("{WHATSAPP_PREFIX}{}", strip_channel_prefix(to))),
        ];
        match template_sid {
            Some(t) => form.push(("ContentSid", t.to_string())),
            None => form.push(("Body", body.to_string())),
        }
        self.post_form("send_whatsapp", &self.messages_url(), &form).await
    }

    async fn create_task(&self, task: &TaskRequest) -> Result<String> {
        let url = format!(
            "{}/Workspaces/{}/Tasks",
            self.bases.taskrouter, self.creds.workspace_sid
        );
        let form = [
            ("WorkflowSid", self.creds.workflow_sid.clone()),
            ("Attributes", task.attributes().to_string()),
            ("Priority", task.priority.to_string()),
            ("Timeout", "300".to_string()),
        ];
        self.post_form("create_task", &url, &form).await
    }

    async fn create_conversation(
        &self,
        user_phone: &str,
        mentor_identity: &str,
        task_sid: &str,
    ) -> Result<String> {
        let service = &self.creds.conversations_service_sid;
        let base = &self.bases.conversations;
        let short: String = task_sid.chars().take(8).collect();
        let url = format!("{base}/Services/{service}/Conversations");
        let conv_sid = self
            .post_form(
                "create_conversation",
                &url,
                &[("FriendlyName", format!("Support Session - {short}"))],
            )
            .await?;

        let participants =
            format!("{base}/Services/{service}/Conversations/{conv_sid}/Participants");
        self.post_form(
            "add_user_participant",
            &participants,
            &[
                (
                    "MessagingBinding.Address",
                    strip_channel_prefix(user_phone).to_string(),
                ),
                (
                    "MessagingBinding.ProxyAddress",
                    self.creds.phone_number.clone(),
                ),
            ],
        )
        .await?;
        self.post_form(
            "add_mentor_participant",
            &participants,
            &[("Identity", mentor_identity.to_string())],
        )
        .await?;
        Ok(conv_sid)
    }

    async fn make_outbound_call(&self, to: &str, user_id: &str) -> Result<String> {
        let url = format!("{}/Accounts/{}/Calls.json", self.bases.api, self.creds.account_sid);
        let form = [
            ("To", strip_channel_prefix(to).to_string()),
            ("From", self.creds.phone_number.clone()),
            (
                "Url",
                format!("{}/voice/outbound/{user_id}", self.webhook_base_url),
            ),
            ("Method", "POST".to_string()),
        ];
        self.post_form("make_outbound_call", &url, &form).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::risk::RiskLevel;
    use axum::extract::{Form, State};
    use axum::http::{StatusCode as Status, Uri};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Hits = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    /// Stand-in for the three REST products. Calls fail twice with 503,
    /// tasks are always rejected with 400.
    async fn rest(
        State(hits): State<Hits>,
        uri: Uri,
        Form(form): Form<HashMap<String, String>>,
    ) -> (Status, Json<Value>) {
        let path = uri.path().to_string();
        let seen = {
            let mut h = hits.lock().unwrap();
            h.push((path.clone(), form));
            h.iter().filter(|(p, _)| *p == path).count()
        };
        if path.ends_with("/Calls.json") && seen <= 2 {
            return (Status::SERVICE_UNAVAILABLE, Json(json!({ "message": "busy" })));
        }
        if path.ends_with("/Tasks") {
            return (Status::BAD_REQUEST, Json(json!({ "message": "bad workflow" })));
        }
        let sid = if path.ends_with("/Participants") {
            "MB1"
        } else if path.ends_with("/Conversations") {
            "CH1"
        } else if path.ends_with("/Calls.json") {
            "CA1"
        } else {
            "SM1"
        };
        (Status::CREATED, Json(json!({ "sid": sid })))
    }

    async fn client() -> (TwilioClient, Hits, TwilioSettings) {
        let hits: Hits = Arc::default();
        let app = Router::new().fallback(rest).with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let creds = Settings::for_tests().twilio;
        let root = format!("http://{addr}");
        let client = TwilioClient::new(creds.clone(), "https://arc.test/api")
            .unwrap()
            .with_base_urls(BaseUrls {
                api: format!("{root}/api"),
                taskrouter: format!("{root}/tr"),
                conversations: format!("{root}/cv"),
            })
            .with_backoff(Duration::from_millis(5));
        (client, hits, creds)
    }

    fn posted(hits: &Hits) -> Vec<(String, HashMap<String, String>)> {
        hits.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_the_third_attempt() {
        let (client, hits, creds) = client().await;

        let sid = client.make_outbound_call("+15551230000", "user-1").await.unwrap();

        assert_eq!(sid, "CA1");
        let calls = posted(&hits);
        assert_eq!(calls.len(), 3);
        let (path, form) = &calls[2];
        assert_eq!(path, &format!("/api/Accounts/{}/Calls.json", creds.account_sid));
        assert_eq!(form["To"], "+15551230000");
        assert_eq!(form["From"], creds.phone_number);
        assert_eq!(form["Url"], "https://arc.test/api/voice/outbound/user-1");
        assert_eq!(form["Method"], "POST");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (client, hits, creds) = client().await;
        let task = TaskRequest {
            user_id: "user-1".into(),
            priority: 10,
            risk_level: RiskLevel::High,
            context: json!({ "escalation_reason": "crisis_keywords_detected" }),
        };

        let err = client.create_task(&task).await.unwrap_err();

        assert!(err.to_string().contains("400"));
        let tasks = posted(&hits);
        assert_eq!(tasks.len(), 1);
        let (path, form) = &tasks[0];
        assert_eq!(path, &format!("/tr/Workspaces/{}/Tasks", creds.workspace_sid));
        assert_eq!(form["WorkflowSid"], creds.workflow_sid);
        assert_eq!(form["Priority"], "10");
        let attrs: Value = serde_json::from_str(&form["Attributes"]).unwrap();
        assert_eq!(attrs["type"], "mental_health_support");
        assert_eq!(attrs["risk_level"], "high");
        assert_eq!(attrs["context"]["escalation_reason"], "crisis_keywords_detected");
    }

    #[tokio::test]
    async fn whatsapp_numbers_carry_the_channel_prefix() {
        let (client, hits, creds) = client().await;

        client
            .send_whatsapp("whatsapp:+15551230000", "hello", None)
            .await
            .unwrap();
        client.send_sms("+15551230000", "hi", None).await.unwrap();

        let sent = posted(&hits);
        let (_, wa) = &sent[0];
        assert_eq!(wa["To"], "whatsapp:+15551230000");
        assert_eq!(wa["From"], format!("whatsapp:{}", creds.phone_number));
        assert_eq!(wa["Body"], "hello");
        let (_, sms) = &sent[1];
        assert_eq!(sms["To"], "+15551230000");
        assert_eq!(sms["MessagingServiceSid"], creds.messaging_service_sid);
    }

    #[tokio::test]
    async fn conversation_adds_both_participants() {
        let (client, hits, creds) = client().await;

        let sid = client
            .create_conversation("whatsapp:+15551230000", "WKmentor", "WT0123456789")
            .await
            .unwrap();

        assert_eq!(sid, "CH1");
        let posts = posted(&hits);
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].1["FriendlyName"], "Support Session - WT012345");
        assert!(posts[1].0.ends_with("/Conversations/CH1/Participants"));
        assert_eq!(posts[1].1["MessagingBinding.Address"], "+15551230000");
        assert_eq!(posts[1].1["MessagingBinding.ProxyAddress"], creds.phone_number);
        assert_eq!(posts[2].1["Identity"], "WKmentor");
    }
}
