//! Voice webhooks. Calls are answered with TwiML; call audio itself goes to
//! the media stream referenced from the greeting and is not handled here.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::post,
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai::GeneratedReply;
use crate::logging::{anon_hash, preview};
use crate::metrics;
use crate::risk::escalation::PRIORITY_CRISIS;
use crate::risk::{ClassifyContext, Intent, RiskLevel};
use crate::state::AppState;
use crate::store::models::{
    HandledBy, NewInteraction, NewRiskEvent, RiskEventType, SessionType, User,
};
use crate::telephony::{strip_channel_prefix, Channel, TaskRequest};
use crate::twiml::{self, xml_response};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/voice/inbound", post(inbound_call))
        .route("/voice/outbound/{user_id}", post(outbound_call))
        .route("/voice/gather", post(gather))
}

#[derive(Debug, Deserialize)]
pub struct InboundCall {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
}

#[derive(Debug, Deserialize)]
pub struct OutboundCall {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
}

#[derive(Debug, Deserialize)]
pub struct GatherInput {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: Option<String>,
    #[serde(rename = "Digits", default)]
    pub digits: Option<String>,
}

async fn inbound_call(State(state): State<AppState>, Form(call): Form<InboundCall>) -> Response {
    info!(
        call_sid = %call.call_sid,
        from = %anon_hash(&call.from),
        call_status = %call.call_status,
        "inbound_call_received"
    );
    metrics::record_inbound(Channel::Voice.as_str());

    let user = state
        .store
        .user_by_phone(strip_channel_prefix(&call.from))
        .filter(|u| u.is_active);
    match &user {
        Some(u) => {
            // Keyed by CallSid so later gather callbacks can find the caller.
            state.store.insert_interaction(
                NewInteraction::inbound(
                    u.user_id,
                    Channel::Voice,
                    format!("Voice call initiated - CallSid: {}", call.call_sid),
                )
                .session(call.call_sid.as_str()),
            );
            info!(user_id = %u.user_id, call_sid = %call.call_sid, "call_from_registered_user");
        }
        None => info!(call_sid = %call.call_sid, "call_from_unregistered_user"),
    }

    let stream_session = Uuid::new_v4().to_string();
    let doc = twiml::inbound_greeting(
        &state.settings.voice_stream_url(&stream_session),
        &state.settings.webhook_url("/voice/gather"),
    );
    match doc {
        Ok(xml) => xml_response(Ok(xml)),
        Err(e) => {
            error!(call_sid = %call.call_sid, error = %e, "voice_call_error");
            xml_response(twiml::call_error())
        }
    }
}

async fn outbound_call(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Form(call): Form<OutboundCall>,
) -> Response {
    info!(
        user_id = %user_id,
        call_sid = %call.call_sid,
        call_status = %call.call_status,
        "outbound_call_webhook"
    );

    let user = Uuid::parse_str(&user_id)
        .ok()
        .and_then(|id| state.store.user(id));
    let Some(user) = user else {
        warn!(user_id = %user_id, call_sid = %call.call_sid, "outbound_call_unknown_user");
        return xml_response(twiml::hangup());
    };

    state.store.insert_interaction(
        NewInteraction::outbound(
            user.user_id,
            Channel::Voice,
            format!("Proactive crisis intervention call - CallSid: {}", call.call_sid),
            HandledBy::AiProactive,
        )
        .session(call.call_sid.as_str()),
    );
    xml_response(twiml::crisis_call(
        &user.alias,
        &state.settings.webhook_url("/voice/gather"),
    ))
}

async fn gather(State(state): State<AppState>, Form(input): Form<GatherInput>) -> Response {
    info!(
        call_sid = %input.call_sid,
        has_speech = input.speech_result.is_some(),
        digits = input.digits.as_deref().unwrap_or(""),
        "voice_input_received"
    );

    let user = state
        .store
        .interaction_by_session(&input.call_sid)
        .and_then(|i| state.store.user(i.user_id));
    let Some(user) = user else {
        return xml_response(twiml::unknown_caller());
    };

    if input.digits.as_deref().map(str::trim) == Some("1") {
        return xml_response(human_requested(&state, &user, &input.call_sid).await);
    }

    match input.speech_result.as_deref().map(str::trim) {
        Some(speech) if !speech.is_empty() => {
            let reply = converse(&state, &user, &input.call_sid, speech).await;
            xml_response(twiml::gather_reply(
                &reply.text,
                &state.settings.webhook_url("/voice/gather"),
            ))
        }
        _ => xml_response(twiml::no_input()),
    }
}

/// Keypad "1": route the caller to a mentor once per call.
async fn human_requested(state: &AppState, user: &User, call_sid: &str) -> anyhow::Result<String> {
    if !state
        .store
        .claim_event(&format!("dtmf:{call_sid}"), Utc::now())
    {
        metrics::record_duplicate_event();
        return twiml::human_transfer();
    }

    let task = TaskRequest {
        user_id: user.user_id.to_string(),
        priority: PRIORITY_CRISIS,
        risk_level: RiskLevel::High,
        context: json!({ "call_sid": call_sid, "requested_human": true }),
    };
    match state.telephony.create_task(&task).await {
        Ok(task_sid) => {
            state
                .store
                .open_mentor_session(user.user_id, SessionType::Voice, &task_sid, Utc::now());
            info!(
                user_id = %user.user_id,
                call_sid,
                task_sid = %task_sid,
                "voice_human_escalation_requested"
            );
            twiml::human_transfer()
        }
        Err(e) => {
            error!(user_id = %user.user_id, call_sid, error = %e, "voice_escalation_failed");
            twiml::transfer_unavailable()
        }
    }
}

/// Classify and answer one spoken turn; escalate when the decision table says so.
async fn converse(state: &AppState, user: &User, call_sid: &str, speech: &str) -> GeneratedReply {
    let ctx = ClassifyContext {
        alias: user.alias.clone(),
        recent_interactions_count: None,
        channel: Some(Channel::Voice.as_str()),
    };
    let assessment = state.classifier.classify(speech, Some(&ctx)).await;
    let reply = state
        .replies
        .generate(speech, &user.alias, assessment.level, Intent::VoiceSupport, &[], &[])
        .await;

    let inbound = state.store.insert_interaction(
        NewInteraction::inbound(user.user_id, Channel::Voice, speech)
            .risk_score(assessment.score)
            .session(call_sid),
    );
    state.store.insert_interaction(
        NewInteraction::outbound(user.user_id, Channel::Voice, reply.text.as_str(), HandledBy::Ai)
            .session(call_sid),
    );

    let decision = state.policy.decide(&assessment, speech);
    if !decision.escalate {
        return reply;
    }
    // A retried callback carries the same speech; answer it but route once.
    let key = format!("gather:{call_sid}:{}", anon_hash(speech));
    if !state.store.claim_event(&key, Utc::now()) {
        metrics::record_duplicate_event();
        return reply;
    }

    state.store.insert_risk_event(NewRiskEvent {
        user_id: user.user_id,
        event_type: if assessment.has_crisis_keywords() {
            RiskEventType::Crisis
        } else {
            RiskEventType::HighRisk
        },
        risk_level: assessment.level,
        source_interaction_id: Some(inbound.id),
        trigger_keywords: assessment.keywords.clone(),
    });
    metrics::record_escalation(decision.reason);

    let task = TaskRequest {
        user_id: user.user_id.to_string(),
        priority: PRIORITY_CRISIS,
        risk_level: assessment.level,
        context: json!({
            "call_sid": call_sid,
            "speech_input": speech,
            "risk_score": assessment.score,
            "escalation_reason": decision.reason.as_str(),
        }),
    };
    match state.telephony.create_task(&task).await {
        Ok(task_sid) => {
            state
                .store
                .open_mentor_session(user.user_id, SessionType::Voice, &task_sid, Utc::now());
            warn!(
                user_id = %user.user_id,
                risk_score = assessment.score,
                reason = decision.reason.as_str(),
                task_sid = %task_sid,
                "voice_auto_escalation"
            );
        }
        Err(e) => error!(
            user_id = %user.user_id,
            speech_preview = %preview(speech, 50),
            error = %e,
            "voice_auto_escalation_failed"
        ),
    }
    reply
}
