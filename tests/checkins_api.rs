// tests/checkins_api.rs
//
// Daily check-in endpoints: structured answers, validation, summary and the
// due-prompt sender.

mod common;

use arc_companion::store::models::UserPreference;
use arc_companion::store::Store;
use axum::http::StatusCode;
use chrono::Utc;
use common::{get_json, post_empty, post_json, Harness};
use serde_json::json;

const PHONE: &str = "+15558889999";

#[tokio::test]
async fn structured_answer_is_scored_and_acknowledged() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Quinn");

    let uri = format!("/checkins/respond?user_id={}", user.user_id);
    let (status, body) = post_json(
        h.router(),
        &uri,
        json!({ "craving_level": 0, "mood_word": "grateful", "completed_plan": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "checkin_processed");
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["response_sent"], true);
    let score = body["wellness_score"].as_f64().expect("score");
    assert!(score >= 0.8, "craving 0 + positive mood + plan done, got {score}");

    let sent = h.tel.messages_to(PHONE);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Wonderful to hear you're feeling grateful!"));
}

#[tokio::test]
async fn strong_craving_gets_a_follow_up() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Quinn");

    let uri = format!("/checkins/respond?user_id={}", user.user_id);
    post_json(
        h.router(),
        &uri,
        json!({ "craving_level": 3, "mood_word": "anxious", "completed_plan": false }),
    )
    .await;

    let sent = h.tel.messages_to(PHONE);
    assert_eq!(sent.len(), 2);
    assert!(sent[1].body.contains("strong cravings today"));
}

#[tokio::test]
async fn invalid_answers_are_rejected() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Quinn");
    let uri = format!("/checkins/respond?user_id={}", user.user_id);

    let (status, _) = post_json(
        h.router(),
        &uri,
        json!({ "craving_level": 4, "mood_word": "ok", "completed_plan": true }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        h.router(),
        &uri,
        json!({ "craving_level": 1, "mood_word": "  ", "completed_plan": true }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        h.router(),
        "/checkins/respond?user_id=4b1c1f0e-0000-4000-8000-000000000000",
        json!({ "craving_level": 1, "mood_word": "ok", "completed_plan": true }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "User not found");

    assert!(h.store.recent_checkins(user.user_id, 5).is_empty());
    assert!(h.tel.messages().is_empty());
}

#[tokio::test]
async fn summary_reports_latest_score_and_streak() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Quinn");

    let (_, body) = get_json(h.router(), &format!("/checkins/summary/{}", user.user_id)).await;
    assert_eq!(body["current_streak"], 0);
    assert_eq!(body["wellness_score"], 0.5);
    assert!(body["last_checkin"].is_null());
    assert_eq!(body["trend"], "stable");

    let uri = format!("/checkins/respond?user_id={}", user.user_id);
    let (_, done) = post_json(
        h.router(),
        &uri,
        json!({ "craving_level": 1, "mood_word": "tired", "completed_plan": true }),
    )
    .await;

    let (status, body) = get_json(
        h.router(),
        &format!("/checkins/summary/{}?days=0", user.user_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["wellness_score"], done["wellness_score"]);
    assert!(body["last_checkin"].is_string());

    let (status, _) = get_json(h.router(), "/checkins/summary/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn due_prompts_go_out_once_per_day() {
    let h = Harness::new();
    let due = h.add_user(PHONE, "Quinn");
    let later = h.add_user("+15550001111", "Ash");
    let abroad = arc_companion::store::models::User::new("+15550002222", "Lee")
        .with_utc_offset_minutes(120);
    h.store.insert_user(abroad.clone());
    let now = Utc::now();

    h.store.set_preference(UserPreference {
        user_id: due.user_id,
        checkin_time: now.format("%H:%M").to_string(),
    });
    // Due at the same instant, expressed in the user's own clock.
    h.store.set_preference(UserPreference {
        user_id: abroad.user_id,
        checkin_time: (now + chrono::Duration::hours(2)).format("%H:%M").to_string(),
    });
    h.store.set_preference(UserPreference {
        user_id: later.user_id,
        checkin_time: (now + chrono::Duration::hours(6)).format("%H:%M").to_string(),
    });

    let (status, body) = post_empty(h.router(), "/checkins/send").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "checkins_sent");
    assert_eq!(body["count"], 2);
    assert_eq!(h.tel.messages_to("+15550002222").len(), 1);

    let sent = h.tel.messages_to(PHONE);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Time for your daily check-in"));
    assert!(h.tel.messages_to("+15550001111").is_empty());

    let (_, body) = post_empty(h.router(), "/checkins/send").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn failed_prompt_is_sent_on_the_next_run() {
    let h = Harness::new();
    let user = h.add_user(PHONE, "Quinn");
    h.store.set_preference(UserPreference {
        user_id: user.user_id,
        checkin_time: Utc::now().format("%H:%M").to_string(),
    });

    h.tel.fail_messages(true);
    let (_, body) = post_empty(h.router(), "/checkins/send").await;
    assert_eq!(body["count"], 0);

    h.tel.fail_messages(false);
    let (_, body) = post_empty(h.router(), "/checkins/send").await;
    assert_eq!(body["count"], 1);
    assert_eq!(h.tel.messages_to(PHONE).len(), 1);
}
