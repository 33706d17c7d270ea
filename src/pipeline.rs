//! # Inbound message pipeline
//! classify → persist → decide → escalate to a mentor, or reply.
//!
//! Runs off the webhook's request path. The webhook has already claimed the
//! event sid, so each inbound message goes through here at most once.

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::checkins::{self, service::process_checkin};
use crate::logging::preview;
use crate::metrics;
use crate::resources::pick_resource;
use crate::risk::escalation::escalation_priority;
use crate::risk::{ClassifyContext, EscalationReason, Intent, RiskAssessment};
use crate::state::AppState;
use crate::store::models::{
    HandledBy, NewInteraction, NewRiskEvent, RiskEventType, SessionType, User,
};
use crate::telephony::{deliver, Channel, TaskRequest};

/// Interactions loaded as conversational context.
pub const CONTEXT_INTERACTIONS: usize = 5;

pub const ESCALATION_TEXT: &str = "I can hear this is really important. I'm connecting you with one of our human mentors right now. They'll be with you shortly. In the meantime, you're doing the right thing by reaching out.";
pub const CRISIS_ESCALATION_TEXT: &str = "I'm here with you. I'm immediately connecting you to someone who can provide the support you need. Please stay with me. If this is an emergency, please also call 988 or 911.";
/// Sent when the routing task could not be created.
pub const ESCALATION_UNAVAILABLE_TEXT: &str = "I'm here with you, but I couldn't reach a mentor just now. If you are in danger, please call 988 or 911 right away. Please keep talking to me.";
pub const PROCESSING_FALLBACK_TEXT: &str = "I'm having trouble processing your message right now, but I want you to know I'm here. Please try again, or if this is urgent, don't hesitate to call our support line.";

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user_id: Uuid,
    pub text: String,
    /// Vendor message id; stored as the interaction's session id.
    pub event_sid: String,
    pub channel: Channel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    UserMissing,
    CheckIn { wellness_score: f32 },
    Escalated { task_sid: String, reason: EscalationReason },
    /// The routing task failed; the user got safety numbers instead.
    EscalationFailed { reason: EscalationReason },
    Replied { from_model: bool },
}

pub async fn process_inbound(state: &AppState, ev: InboundEvent) -> Outcome {
    let Some(user) = state.store.user(ev.user_id) else {
        warn!(user_id = %ev.user_id, "inbound_user_missing");
        return Outcome::UserMissing;
    };

    if let Some(answer) = checkins::parse_checkin_reply(&ev.text) {
        // A crisis phrase always takes the risk path, even inside a check-in reply.
        if !state.settings.crisis_keywords.matches_any(&ev.text) {
            state.store.insert_interaction(
                NewInteraction::inbound(user.user_id, ev.channel, ev.text.as_str())
                    .session(ev.event_sid.as_str()),
            );
            let done = process_checkin(state, &user, answer, ev.channel, Utc::now()).await;
            return Outcome::CheckIn {
                wellness_score: done.wellness_score,
            };
        }
    }

    let recent = state
        .store
        .recent_interactions(user.user_id, CONTEXT_INTERACTIONS);

    let ctx = ClassifyContext {
        alias: user.alias.clone(),
        recent_interactions_count: Some(recent.len()),
        channel: Some(ev.channel.as_str()),
    };
    let assessment = state.classifier.classify(&ev.text, Some(&ctx)).await;

    let inbound = state.store.insert_interaction(
        NewInteraction::inbound(user.user_id, ev.channel, ev.text.as_str())
            .risk_score(assessment.score)
            .session(ev.event_sid.as_str()),
    );

    let decision = state.policy.decide(&assessment, &ev.text);
    if decision.escalate {
        return escalate(state, &user, &ev, &assessment, decision.reason, inbound.id).await;
    }

    let intent = match assessment.intent {
        Intent::Unknown => Intent::SupportNeeded,
        other => other,
    };
    let resources = state.store.coping_resources();
    let reply = state
        .replies
        .generate(
            &ev.text,
            &user.alias,
            assessment.level,
            intent,
            &recent,
            &resources,
        )
        .await;
    let suggested = reply
        .resource_id
        .as_deref()
        .and_then(|id| pick_resource(state.store.as_ref(), Some(id), None));
    if let Some(resource) = suggested {
        state.store.record_resource_use(&resource.id);
    }

    let sent = deliver(state.telephony.as_ref(), ev.channel, &user.phone, &reply.text).await;
    state.store.insert_interaction(
        NewInteraction::outbound(user.user_id, ev.channel, reply.text.as_str(), HandledBy::Ai)
            .session(ev.event_sid.as_str()),
    );

    info!(
        user_id = %user.user_id,
        risk_level = assessment.level.as_str(),
        response_sent = sent.is_some(),
        "message_processed_successfully"
    );
    Outcome::Replied {
        from_model: reply.from_model,
    }
}

async fn escalate(
    state: &AppState,
    user: &User,
    ev: &InboundEvent,
    assessment: &RiskAssessment,
    reason: EscalationReason,
    interaction_id: u64,
) -> Outcome {
    let crisis = assessment.has_crisis_keywords();
    state.store.insert_risk_event(NewRiskEvent {
        user_id: user.user_id,
        event_type: if crisis {
            RiskEventType::Crisis
        } else {
            RiskEventType::HighRisk
        },
        risk_level: assessment.level,
        source_interaction_id: Some(interaction_id),
        trigger_keywords: assessment.keywords.clone(),
    });
    metrics::record_escalation(reason);

    let task = TaskRequest {
        user_id: user.user_id.to_string(),
        priority: escalation_priority(assessment),
        risk_level: assessment.level,
        context: json!({
            "message": ev.text,
            "risk_score": assessment.score,
            "escalation_reason": reason.as_str(),
        }),
    };

    match state.telephony.create_task(&task).await {
        Ok(task_sid) => {
            let text = if crisis {
                CRISIS_ESCALATION_TEXT
            } else {
                ESCALATION_TEXT
            };
            deliver(state.telephony.as_ref(), ev.channel, &user.phone, text).await;
            state.store.insert_interaction(
                NewInteraction::outbound(user.user_id, ev.channel, text, HandledBy::AiEscalation)
                    .session(ev.event_sid.as_str()),
            );
            let session_type = if crisis {
                SessionType::Emergency
            } else {
                SessionType::Chat
            };
            let session =
                state
                    .store
                    .open_mentor_session(user.user_id, session_type, &task_sid, Utc::now());
            warn!(
                user_id = %user.user_id,
                risk_level = assessment.level.as_str(),
                task_sid = %task_sid,
                mentor_session_id = session.id,
                reason = reason.as_str(),
                "escalation_initiated"
            );
            Outcome::Escalated { task_sid, reason }
        }
        Err(e) => {
            error!(
                user_id = %user.user_id,
                reason = reason.as_str(),
                error = %e,
                "escalation_task_failed"
            );
            deliver(
                state.telephony.as_ref(),
                ev.channel,
                &user.phone,
                ESCALATION_UNAVAILABLE_TEXT,
            )
            .await;
            state.store.insert_interaction(
                NewInteraction::outbound(
                    user.user_id,
                    ev.channel,
                    ESCALATION_UNAVAILABLE_TEXT,
                    HandledBy::AiEscalation,
                )
                .session(ev.event_sid.as_str()),
            );
            Outcome::EscalationFailed { reason }
        }
    }
}

/// Run [`process_inbound`] in the background. If it panics, the user still
/// gets a reply.
pub fn spawn_inbound(state: AppState, ev: InboundEvent) -> JoinHandle<Option<Outcome>> {
    tokio::spawn(async move {
        let user_id = ev.user_id;
        let channel = ev.channel;
        let sid = ev.event_sid.clone();
        let text_preview = preview(&ev.text, 50);

        let worker = {
            let state = state.clone();
            tokio::spawn(async move { process_inbound(&state, ev).await })
        };
        match worker.await {
            Ok(outcome) => {
                debug!(message_sid = %sid, ?outcome, "inbound_processed");
                Some(outcome)
            }
            Err(e) => {
                error!(
                    user_id = %user_id,
                    message_sid = %sid,
                    text_preview = %text_preview,
                    error = %e,
                    "background_message_processing_error"
                );
                if let Some(user) = state.store.user(user_id) {
                    if deliver(
                        state.telephony.as_ref(),
                        channel,
                        &user.phone,
                        PROCESSING_FALLBACK_TEXT,
                    )
                    .await
                    .is_none()
                    {
                        error!(user_id = %user_id, "fallback_response_failed");
                    }
                }
                None
            }
        }
    })
}
