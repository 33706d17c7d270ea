use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::find_user;
use crate::checkins::service::{process_checkin, send_due_checkins, summary, CheckInSummary};
use crate::checkins::{CheckInAnswer, MAX_CRAVING_LEVEL};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telephony::Channel;

const MAX_SUMMARY_DAYS: u32 = 365;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkins/respond", post(respond))
        .route("/checkins/send", post(send))
        .route("/checkins/summary/{user_id}", get(get_summary))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

#[derive(Debug, Serialize)]
pub struct CheckInProcessed {
    pub status: &'static str,
    pub wellness_score: f32,
    pub current_streak: u32,
    pub response_sent: bool,
}

async fn respond(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
    Json(answer): Json<CheckInAnswer>,
) -> ApiResult<Json<CheckInProcessed>> {
    info!(
        user_id = %q.user_id,
        craving_level = answer.craving_level,
        mood = %answer.mood_word,
        completed_plan = answer.completed_plan,
        "checkin_response_received"
    );
    let user = find_user(&state, &q.user_id)?;
    if answer.craving_level > MAX_CRAVING_LEVEL {
        return Err(ApiError::BadRequest(format!(
            "craving_level must be between 0 and {MAX_CRAVING_LEVEL}"
        )));
    }
    if answer.mood_word.trim().is_empty() {
        return Err(ApiError::BadRequest("mood_word must not be empty".to_string()));
    }

    let done = process_checkin(&state, &user, answer, Channel::Sms, Utc::now()).await;
    Ok(Json(CheckInProcessed {
        status: "checkin_processed",
        wellness_score: done.wellness_score,
        current_streak: done.current_streak,
        response_sent: done.response_sent,
    }))
}

async fn send(State(state): State<AppState>) -> Json<Value> {
    let count = send_due_checkins(&state, Utc::now()).await;
    Json(json!({ "status": "checkins_sent", "count": count }))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> ApiResult<Json<CheckInSummary>> {
    let user = find_user(&state, &user_id)?;
    let days = q.days.clamp(1, MAX_SUMMARY_DAYS);
    Ok(Json(summary(&state, user.user_id, days, Utc::now())))
}
