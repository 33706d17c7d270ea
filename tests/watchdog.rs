// tests/watchdog.rs
//
// Unanswered emergency sessions get one proactive call after the crisis
// response timeout.

mod common;

use arc_companion::pipeline::{process_inbound, InboundEvent};
use arc_companion::store::models::SessionType;
use arc_companion::store::Store;
use arc_companion::telephony::Channel;
use arc_companion::watchdog::call_unanswered_crises;
use chrono::{Duration, Utc};
use common::Harness;

const PHONE: &str = "+15554445555";

async fn crisis(h: &Harness, user_id: uuid::Uuid, sid: &str) {
    process_inbound(
        &h.state,
        InboundEvent {
            user_id,
            text: "I want to kill myself".to_string(),
            event_sid: sid.to_string(),
            channel: Channel::Sms,
        },
    )
    .await;
}

#[tokio::test]
async fn overdue_emergency_gets_one_call() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Morgan");
    crisis(&h, user.user_id, "SMw1").await;

    let sessions = h.store.all_sessions();
    assert_eq!(sessions[0].session_type, SessionType::Emergency);

    // Still inside the 5 minute window.
    assert_eq!(call_unanswered_crises(&h.state, Utc::now()).await, 0);

    let later = Utc::now() + Duration::minutes(6);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 1);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 0);

    let calls = h.tel.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].to, PHONE);
    assert_eq!(calls[0].user_id, user.user_id.to_string());
}

#[tokio::test]
async fn assigned_sessions_are_left_alone() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Morgan");
    crisis(&h, user.user_id, "SMw2").await;

    let mut session = h.store.all_sessions().remove(0);
    session.mentor_id = "WKmentor".to_string();
    h.store.update_mentor_session(&session);

    let later = Utc::now() + Duration::minutes(30);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 0);
    assert!(h.tel.calls().is_empty());
}

#[tokio::test]
async fn failed_call_is_retried_on_the_next_tick() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Morgan");
    crisis(&h, user.user_id, "SMw3").await;
    let later = Utc::now() + Duration::minutes(6);

    h.tel.fail_calls(true);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 0);
    assert!(h.tel.calls().is_empty());

    h.tel.fail_calls(false);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 1);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 0);
    assert_eq!(h.tel.calls().len(), 1);
}

#[tokio::test]
async fn inactive_user_does_not_use_up_the_call() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Morgan");
    crisis(&h, user.user_id, "SMw4").await;
    let later = Utc::now() + Duration::minutes(6);

    h.store.set_user_active(user.user_id, false);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 0);

    h.store.set_user_active(user.user_id, true);
    assert_eq!(call_unanswered_crises(&h.state, later).await, 1);
}
