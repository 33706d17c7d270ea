// tests/api_http.rs
//
// HTTP-level tests for the Router without opening sockets.
//
// Covered:
// - GET / and GET /health
// - POST /messaging/inbound (welcome, duplicates, opt-out/in, background reply)

mod common;

use arc_companion::store::Store;
use axum::http::StatusCode;
use common::{eventually, get_json, post_form, Harness};

const PHONE: &str = "+15551234567";

fn inbound<'a>(from: &'a str, body: &'a str, sid: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("Body", body),
        ("From", from),
        ("To", "+15550000000"),
        ("MessageSid", sid),
        ("AccountSid", "ACtest"),
    ]
}

#[tokio::test]
async fn health_and_root_answer_json() {
    let h = Harness::new();

    let (status, body) = get_json(h.router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "arc-api");
    assert!(body["version"].as_str().is_some());

    let (status, body) = get_json(h.router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "AI Recovery Companion is running!");
}

#[tokio::test]
async fn unknown_sender_gets_welcome_twiml() {
    let h = Harness::new();

    let (status, ctype, body) = post_form(
        h.router(),
        "/messaging/inbound",
        &inbound("+15559990000", "hello?", "SM0001"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctype.as_deref(), Some("application/xml"));
    assert!(body.contains("<Message>Hello! I'm ARC, your AI Recovery Companion."));
    assert!(h.tel.messages().is_empty(), "welcome travels in the TwiML only");
}

#[tokio::test]
async fn duplicate_message_sid_is_processed_once() {
    let h = Harness::new();
    h.add_user(PHONE, "River");
    let form = inbound(PHONE, "Long day but I'm ok", "SMdup");

    let (_, _, first) = post_form(h.router(), "/messaging/inbound", &form).await;
    let (_, _, second) = post_form(h.router(), "/messaging/inbound", &form).await;
    assert!(first.ends_with("<Response/>"));
    assert!(second.ends_with("<Response/>"));

    assert!(eventually(|| h.tel.messages_to(PHONE).len() == 1).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.tel.messages_to(PHONE).len(), 1);
    assert_eq!(h.llm.risk_calls(), 1);
}

#[tokio::test]
async fn stop_then_start_toggles_subscription() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "River");

    let (_, _, body) =
        post_form(h.router(), "/messaging/inbound", &inbound(PHONE, " stop ", "SM1")).await;
    assert!(body.contains("You have been unsubscribed from ARC messages."));
    assert!(!h.store.user(user.user_id).expect("user").is_active);

    // Inactive users are not processed.
    let (_, _, body) =
        post_form(h.router(), "/messaging/inbound", &inbound(PHONE, "anyone there", "SM2")).await;
    assert!(body.ends_with("<Response/>"));

    let (_, _, body) =
        post_form(h.router(), "/messaging/inbound", &inbound(PHONE, "START", "SM3")).await;
    assert!(body.contains("Welcome back, River!"));
    assert!(h.store.user(user.user_id).expect("user").is_active);

    let (_, _, body) =
        post_form(h.router(), "/messaging/inbound", &inbound(PHONE, "yes", "SM4")).await;
    assert!(body.contains("Hi River! I'm already here for you."));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.llm.risk_calls(), 0);
    assert!(h.tel.messages().is_empty());
}

#[tokio::test]
async fn ordinary_message_is_answered_in_background() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "River");

    let (status, _, body) = post_form(
        h.router(),
        "/messaging/inbound",
        &inbound(PHONE, "Work was stressful today", "SMbg1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.ends_with("<Response/>"));

    assert!(eventually(|| h.tel.messages_to(PHONE).len() == 1).await);
    let sent = h.tel.messages_to(PHONE);
    assert_eq!(
        sent[0].body,
        "Thanks for checking in. Try three slow breaths with me right now."
    );

    assert!(eventually(|| h.store.interaction_count() == 2).await);
    let rows = h.store.recent_interactions(user.user_id, 5);
    assert_eq!(rows[1].session_id.as_deref(), Some("SMbg1"));
    assert_eq!(rows[1].risk_score, Some(0.2));
}

#[tokio::test]
async fn whatsapp_sender_is_answered_on_whatsapp() {
    let h = Harness::new();
    h.add_user(PHONE, "River");

    let from = format!("whatsapp:{PHONE}");
    post_form(
        h.router(),
        "/messaging/inbound",
        &inbound(&from, "Feeling a bit low", "SMwa1"),
    )
    .await;

    assert!(eventually(|| h.tel.messages().len() == 1).await);
    let sent = h.tel.messages();
    assert_eq!(sent[0].channel, arc_companion::telephony::Channel::WhatsApp);
    assert_eq!(sent[0].to, PHONE);
}

#[tokio::test]
async fn crisis_keyword_escalates_to_a_mentor() {
    let h = Harness::new();
    h.add_user(PHONE, "River");

    post_form(
        h.router(),
        "/messaging/inbound",
        &inbound(PHONE, "I feel hopeless tonight", "SMcrisis"),
    )
    .await;

    assert!(eventually(|| h.tel.tasks().len() == 1).await);
    let tasks = h.tel.tasks();
    let (_, task) = &tasks[0];
    assert_eq!(task.priority, 10);
    assert_eq!(task.context["escalation_reason"], "crisis_keywords_detected");

    assert!(eventually(|| h.tel.messages_to(PHONE).len() == 1).await);
    assert!(h.tel.messages_to(PHONE)[0]
        .body
        .contains("immediately connecting you"));
    assert_eq!(h.llm.risk_calls(), 0, "keywords skip the model");
    assert!(eventually(|| h.store.all_sessions().len() == 1).await);
}
