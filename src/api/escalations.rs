//! Mentor escalation endpoints: manual escalation, routing-engine callbacks,
//! mentor chat logging and the active-session dashboard feed.

use axum::{extract::State, routing::{get, post}, Form, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::find_user;
use crate::error::{ApiError, ApiResult};
use crate::logging::preview;
use crate::risk::escalation::PRIORITY_STANDARD;
use crate::risk::RiskLevel;
use crate::state::AppState;
use crate::store::models::{
    Direction, HandledBy, MentorSession, NewInteraction, SessionOutcome, SessionType, User,
};
use crate::telephony::{deliver, Channel, TaskRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/escalations/create", post(create_escalation))
        .route("/escalations/active", get(active_escalations))
        .route("/taskrouter/events", post(taskrouter_event))
        .route("/conversations/message", post(conversation_message))
}

const EMERGENCY_NOTICE: &str = "I'm immediately connecting you with emergency support. A trained mentor will be with you right away. Please stay with me.";
const STANDARD_NOTICE: &str = "I'm connecting you with one of our human mentors. They'll be with you shortly to provide additional support.";

fn default_priority() -> u8 {
    PRIORITY_STANDARD
}

#[derive(Debug, Deserialize)]
pub struct EscalationRequest {
    pub user_id: String,
    pub risk_level: String,
    #[serde(default)]
    pub context: Value,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub session_type: SessionType,
}

#[derive(Debug, Serialize)]
pub struct EscalationCreated {
    pub task_sid: String,
    pub mentor_session_id: u64,
    pub status: &'static str,
}

async fn create_escalation(
    State(state): State<AppState>,
    Json(req): Json<EscalationRequest>,
) -> ApiResult<Json<EscalationCreated>> {
    info!(
        user_id = %req.user_id,
        risk_level = %req.risk_level,
        session_type = req.session_type.as_str(),
        "escalation_requested"
    );
    let user = find_user(&state, &req.user_id)?;
    let risk_level = RiskLevel::parse(&req.risk_level)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown risk_level {:?}", req.risk_level)))?;

    let task = TaskRequest {
        user_id: user.user_id.to_string(),
        priority: req.priority,
        risk_level,
        context: req.context,
    };
    let task_sid = state.telephony.create_task(&task).await.map_err(|e| {
        error!(user_id = %user.user_id, error = %e, "escalation_creation_failed");
        ApiError::Upstream("Failed to create escalation task")
    })?;

    let session = state
        .store
        .open_mentor_session(user.user_id, req.session_type, &task_sid, Utc::now());

    let notice = match req.session_type {
        SessionType::Emergency => EMERGENCY_NOTICE,
        _ => STANDARD_NOTICE,
    };
    deliver(state.telephony.as_ref(), Channel::Sms, &user.phone, notice).await;
    state.store.insert_interaction(NewInteraction::outbound(
        user.user_id,
        Channel::Sms,
        notice,
        HandledBy::AiEscalation,
    ));

    Ok(Json(EscalationCreated {
        task_sid,
        mentor_session_id: session.id,
        status: "escalation_created",
    }))
}

#[derive(Debug, Deserialize)]
pub struct TaskRouterEvent {
    #[serde(rename = "TaskSid")]
    pub task_sid: String,
    #[serde(rename = "WorkerSid", default)]
    pub worker_sid: Option<String>,
    #[serde(rename = "TaskAttributes", default)]
    pub task_attributes: String,
    #[serde(rename = "EventType")]
    pub event_type: String,
    #[serde(rename = "WorkspaceSid", default)]
    pub workspace_sid: String,
}

fn status(s: &str) -> Json<Value> {
    Json(json!({ "status": s }))
}

async fn taskrouter_event(
    State(state): State<AppState>,
    Form(ev): Form<TaskRouterEvent>,
) -> Json<Value> {
    info!(
        task_sid = %ev.task_sid,
        event_type = %ev.event_type,
        worker_sid = ev.worker_sid.as_deref().unwrap_or(""),
        "taskrouter_event_received"
    );

    let Some(mut session) = state.store.session_by_task(&ev.task_sid) else {
        warn!(task_sid = %ev.task_sid, "mentor_session_not_found");
        return status("session_not_found");
    };
    let Some(user) = state.store.user(session.user_id) else {
        warn!(task_sid = %ev.task_sid, user_id = %session.user_id, "mentor_session_user_missing");
        return status("session_not_found");
    };

    match ev.event_type.as_str() {
        "task.assigned" => mentor_assigned(&state, &user, &mut session, &ev).await,
        "task.completed" => {
            if close_session(&state, &mut session, SessionOutcome::Completed) {
                let text = format!(
                    "Thank you for talking with our mentor today, {}. Remember, we're here for you 24/7. How are you feeling now?",
                    user.alias
                );
                deliver(state.telephony.as_ref(), Channel::Sms, &user.phone, &text).await;
                info!(
                    task_sid = %ev.task_sid,
                    duration_seconds = session.duration_seconds.unwrap_or(0),
                    user_id = %user.user_id,
                    "mentor_session_completed"
                );
            }
        }
        "task.canceled" => {
            if close_session(&state, &mut session, SessionOutcome::Canceled) {
                let text = format!(
                    "I'm sorry, {}, but no mentors are available right now. I'm still here for you. If this is an emergency, please call 988 or 911. Otherwise, let's continue talking - what's on your mind?",
                    user.alias
                );
                deliver(state.telephony.as_ref(), Channel::Sms, &user.phone, &text).await;
                warn!(task_sid = %ev.task_sid, user_id = %user.user_id, "mentor_task_canceled");
            }
        }
        other => info!(task_sid = %ev.task_sid, event_type = other, "taskrouter_event_ignored"),
    }

    status("event_processed")
}

async fn mentor_assigned(
    state: &AppState,
    user: &User,
    session: &mut MentorSession,
    ev: &TaskRouterEvent,
) {
    let worker = ev.worker_sid.clone().unwrap_or_else(|| "unknown".to_string());
    session.mentor_id = worker.clone();

    if session.session_type.wants_conversation() && session.conversation_sid.is_none() {
        match state
            .telephony
            .create_conversation(&user.phone, &worker, &ev.task_sid)
            .await
        {
            Ok(sid) => {
                session.conversation_sid = Some(sid);
                let hello = format!(
                    "Hi {}, I'm here to support you. How can I help today?",
                    user.alias
                );
                deliver(state.telephony.as_ref(), Channel::Sms, &user.phone, &hello).await;
            }
            Err(e) => error!(task_sid = %ev.task_sid, error = %e, "conversation_create_failed"),
        }
    }
    state.store.update_mentor_session(session);
    info!(
        task_sid = %ev.task_sid,
        mentor_id = %worker,
        user_id = %user.user_id,
        "mentor_assigned"
    );
}

/// Returns false when the session was already closed by an earlier event.
fn close_session(state: &AppState, session: &mut MentorSession, outcome: SessionOutcome) -> bool {
    if !session.is_active() {
        info!(task_sid = %session.task_sid, "mentor_session_already_closed");
        return false;
    }
    session.close(outcome, Utc::now());
    state.store.update_mentor_session(session)
}

#[derive(Debug, Deserialize)]
pub struct ConversationMessage {
    #[serde(rename = "ConversationSid")]
    pub conversation_sid: String,
    #[serde(rename = "ParticipantSid", default)]
    pub participant_sid: Option<String>,
    #[serde(rename = "Author", default)]
    pub author: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
}

async fn conversation_message(
    State(state): State<AppState>,
    Form(msg): Form<ConversationMessage>,
) -> Json<Value> {
    let body = msg.body.unwrap_or_default();
    info!(
        conversation_sid = %msg.conversation_sid,
        author = msg.author.as_deref().unwrap_or(""),
        body_preview = %preview(&body, 50),
        "conversation_message_received"
    );

    let Some(session) = state.store.session_by_conversation(&msg.conversation_sid) else {
        return status("session_not_found");
    };

    let from_system = msg.author.as_deref() == Some("system");
    let mut row = NewInteraction::inbound(session.user_id, Channel::Conversation, body)
        .session(msg.conversation_sid.as_str());
    if from_system {
        row.direction = Direction::Outbound;
        row = row.handled_by(HandledBy::System);
    } else {
        row = row.handled_by(HandledBy::Mentor);
    }
    state.store.insert_interaction(row);

    status("message_logged")
}

#[derive(Debug, Serialize)]
pub struct ActiveSession {
    pub session_id: u64,
    pub task_sid: String,
    pub user_alias: String,
    pub session_type: SessionType,
    pub started_at: String,
    pub mentor_id: String,
    pub conversation_sid: Option<String>,
    pub risk_level: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct ActiveSessions {
    pub active_sessions: Vec<ActiveSession>,
    pub total_count: usize,
}

async fn active_escalations(State(state): State<AppState>) -> Json<ActiveSessions> {
    let now = Utc::now();
    let rows: Vec<ActiveSession> = state
        .store
        .active_sessions()
        .into_iter()
        .map(|s| {
            let alias = state
                .store
                .user(s.user_id)
                .map(|u| u.alias)
                .unwrap_or_else(|| "Unknown".to_string());
            let risk_level = state
                .store
                .latest_risk_event(s.user_id)
                .map(|e| e.risk_level.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            ActiveSession {
                session_id: s.id,
                task_sid: s.task_sid,
                user_alias: alias,
                session_type: s.session_type,
                started_at: s.started_at.to_rfc3339(),
                mentor_id: s.mentor_id,
                conversation_sid: s.conversation_sid,
                risk_level,
                duration_minutes: (now - s.started_at).num_minutes().max(0),
            }
        })
        .collect();

    Json(ActiveSessions {
        total_count: rows.len(),
        active_sessions: rows,
    })
}
