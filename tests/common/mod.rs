// tests/common/mod.rs
//
// Shared harness: in-memory store, mock language model and a recording
// telephony double behind the real Router.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use arc_companion::ai::MockLlm;
use arc_companion::config::Settings;
use arc_companion::resources::default_resources;
use arc_companion::store::models::User;
use arc_companion::store::{MemoryStore, Store};
use arc_companion::telephony::RecordingTelephony;
use arc_companion::{api, AppState};
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt as _;

const BODY_LIMIT: usize = 1024 * 1024;

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub llm: Arc<MockLlm>,
    pub tel: Arc<RecordingTelephony>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_llm(MockLlm::new())
    }

    pub fn with_llm(llm: MockLlm) -> Self {
        let settings = Settings::for_tests();
        let store = Arc::new(
            MemoryStore::new(settings.event_dedup_ttl_secs).with_resources(default_resources()),
        );
        let llm = Arc::new(llm);
        let tel = Arc::new(RecordingTelephony::new());
        let state = AppState::new(settings, store.clone(), llm.clone(), tel.clone());
        Self {
            state,
            store,
            llm,
            tel,
        }
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub fn add_user(&self, phone: &str, alias: &str) -> User {
        let user = User::new(phone, alias);
        self.store.insert_user(user.clone());
        user
    }
}

/// `application/x-www-form-urlencoded` body.
pub fn form(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).expect("form pairs encode")
}

async fn send(router: Router, req: Request<Body>) -> (StatusCode, Option<String>, String) {
    let resp = router.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let ctype = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, ctype, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

/// POST a webhook form; returns status, content type and raw body.
pub async fn post_form(
    router: Router,
    uri: &str,
    pairs: &[(&str, &str)],
) -> (StatusCode, Option<String>, String) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form(pairs)))
        .expect("build form request");
    send(router, req).await
}

pub async fn post_json(router: Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build json request");
    let (status, _, body) = send(router, req).await;
    (status, serde_json::from_str(&body).unwrap_or(Value::Null))
}

pub async fn post_empty(router: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let (status, _, body) = send(router, req).await;
    (status, serde_json::from_str(&body).unwrap_or(Value::Null))
}

pub async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let (status, _, body) = send(router, req).await;
    (status, serde_json::from_str(&body).unwrap_or(Value::Null))
}

/// Poll until `check` holds; background pipeline work finishes after the
/// webhook has already answered.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
