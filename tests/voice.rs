// tests/voice.rs
//
// Voice webhooks: greeting, proactive call, keypad and speech turns.

mod common;

use arc_companion::ai::MockLlm;
use arc_companion::store::models::{HandledBy, SessionType};
use arc_companion::store::Store;
use axum::http::StatusCode;
use common::{post_form, Harness};

const PHONE: &str = "+15553334444";
const CALL: &str = "CA00000000000000000000000000000001";

async fn answer_call(h: &Harness) -> String {
    let (status, _, body) = post_form(
        h.router(),
        "/voice/inbound",
        &[
            ("CallSid", CALL),
            ("From", PHONE),
            ("To", "+15550000000"),
            ("CallStatus", "ringing"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn gather(h: &Harness, pairs: &[(&str, &str)]) -> String {
    let mut form = vec![("CallSid", CALL)];
    form.extend_from_slice(pairs);
    let (status, ctype, body) = post_form(h.router(), "/voice/gather", &form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctype.as_deref(), Some("application/xml"));
    body
}

#[tokio::test]
async fn inbound_call_greets_and_streams() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Rowan");

    let body = answer_call(&h).await;

    assert!(body.contains("you've reached ARC"));
    assert!(body.contains("<Stream url=\"wss://arc.test/ws/voice/"));
    assert!(body.contains("action=\"https://arc.test/api/voice/gather\""));

    let logged = h.store.interaction_by_session(CALL).expect("call logged");
    assert_eq!(logged.user_id, user.user_id);
    assert!(logged.text.contains(CALL));
}

#[tokio::test]
async fn unregistered_caller_still_hears_greeting() {
    let h = Harness::new();
    let body = answer_call(&h).await;
    assert!(body.contains("you've reached ARC"));
    assert_eq!(h.store.interaction_count(), 0);
}

#[tokio::test]
async fn outbound_call_uses_alias_or_hangs_up() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Rowan");

    let uri = format!("/voice/outbound/{}", user.user_id);
    let (_, _, body) = post_form(
        h.router(),
        &uri,
        &[("CallSid", "CAout"), ("CallStatus", "in-progress")],
    )
    .await;
    assert!(body.contains("Hello Rowan, this is ARC calling to check on you."));
    assert!(body.contains("press 1"));
    let logged = h.store.interaction_by_session("CAout").expect("logged");
    assert_eq!(logged.handled_by, Some(HandledBy::AiProactive));

    let (_, _, body) = post_form(
        h.router(),
        "/voice/outbound/not-a-uuid",
        &[("CallSid", "CAout2")],
    )
    .await;
    assert!(body.ends_with("<Response><Hangup/></Response>"));
}

#[tokio::test]
async fn gather_from_unknown_call_ends_politely() {
    let h = Harness::new();
    let body = gather(&h, &[("SpeechResult", "hello")]).await;
    assert!(body.contains("Our support team will be in touch."));
    assert_eq!(h.llm.risk_calls(), 0);
}

#[tokio::test]
async fn pressing_one_routes_to_mentor_once() {
    let h = Harness::new();
    h.add_user(PHONE, "Rowan");
    answer_call(&h).await;

    let first = gather(&h, &[("Digits", "1")]).await;
    let second = gather(&h, &[("Digits", "1")]).await;

    assert!(first.contains("I'm connecting you with a human mentor right now."));
    assert!(second.contains("I'm connecting you with a human mentor right now."));
    let tasks = h.tel.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].1.priority, 10);
    assert_eq!(tasks[0].1.context["requested_human"], true);
    let sessions = h.store.all_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_type, SessionType::Voice);
}

#[tokio::test]
async fn pressing_one_without_routing_offers_crisis_line() {
    let h = Harness::new();
    h.tel.fail_tasks(true);
    h.add_user(PHONE, "Rowan");
    answer_call(&h).await;

    let body = gather(&h, &[("Digits", "1")]).await;
    assert!(body.contains("call 988"));
    assert!(h.store.all_sessions().is_empty());
}

#[tokio::test]
async fn speech_is_answered_and_logged() {
    let h = Harness::with_llm(MockLlm::new().with_reply("I'm glad you called. What's on your mind?"));
    let user = h.add_user(PHONE, "Rowan");
    answer_call(&h).await;

    let body = gather(&h, &[("SpeechResult", "I had a rough shift at work")]).await;

    assert!(body.contains("<Say voice=\"alice\">I'm glad you called. What's on your mind?</Say>"));
    assert!(body.contains("Press 1 to speak with a human mentor"));
    assert!(h.tel.tasks().is_empty());
    // greeting marker + spoken turn + reply
    assert_eq!(h.store.recent_interactions(user.user_id, 10).len(), 3);
}

#[tokio::test]
async fn crisis_speech_escalates_once_per_utterance() {
    let h = Harness::new();
    h.add_user(PHONE, "Rowan");
    answer_call(&h).await;

    let speech = [("SpeechResult", "I want to end it all")];
    gather(&h, &speech).await;
    gather(&h, &speech).await;

    let tasks = h.tel.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].1.context["escalation_reason"], "crisis_keywords_detected");
    assert_eq!(h.store.risk_event_count(), 1);
}

#[tokio::test]
async fn silence_gets_no_input_goodbye() {
    let h = Harness::new();
    h.add_user(PHONE, "Rowan");
    answer_call(&h).await;

    let body = gather(&h, &[("SpeechResult", "   ")]).await;
    assert!(body.contains("I didn't hear anything"));
    assert!(body.contains("<Hangup/>"));
}
