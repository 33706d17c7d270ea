//! `POST /messaging/inbound`: SMS and WhatsApp webhook.

use axum::{
    extract::State,
    response::Response,
    routing::post,
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use crate::logging::{anon_hash, preview};
use crate::metrics;
use crate::pipeline::{spawn_inbound, InboundEvent};
use crate::state::AppState;
use crate::store::models::User;
use crate::telephony::{strip_channel_prefix, Channel};
use crate::twiml::{self, xml_response};

pub const WELCOME_TEXT: &str = "Hello! I'm ARC, your AI Recovery Companion. To get started, please visit our signup page or contact our team. If this is an emergency, please call 988 or your local emergency services.";
pub const UNSUBSCRIBED_TEXT: &str = "You have been unsubscribed from ARC messages. We're here if you need us again. Take care of yourself. Reply START to reactivate.";
pub const WEBHOOK_FALLBACK_TEXT: &str = "I'm experiencing some technical difficulties right now. Please try again in a moment, or call our support line if this is urgent.";

const OPT_OUT: &[&str] = &["STOP", "UNSUBSCRIBE", "QUIT", "END"];
const OPT_IN: &[&str] = &["START", "YES", "SUBSCRIBE"];

pub fn routes() -> Router<AppState> {
    Router::new().route("/messaging/inbound", post(inbound))
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: String,
    #[serde(rename = "AccountSid", default)]
    pub account_sid: String,
}

async fn inbound(State(state): State<AppState>, Form(msg): Form<InboundMessage>) -> Response {
    let channel = Channel::from_address(&msg.from);
    info!(
        from = %anon_hash(strip_channel_prefix(&msg.from)),
        message_sid = %msg.message_sid,
        channel = channel.as_str(),
        body_preview = %preview(&msg.body, 50),
        "inbound_message_received"
    );
    metrics::record_inbound(channel.as_str());

    if !state
        .store
        .claim_event(&format!("sms:{}", msg.message_sid), Utc::now())
    {
        metrics::record_duplicate_event();
        info!(message_sid = %msg.message_sid, "duplicate_message_ignored");
        return xml_response(twiml::empty());
    }

    match handle(&state, &msg, channel) {
        Ok(doc) => xml_response(Ok(doc)),
        Err(e) => {
            error!(
                message_sid = %msg.message_sid,
                error = %e,
                "message_processing_error"
            );
            xml_response(twiml::message(WEBHOOK_FALLBACK_TEXT))
        }
    }
}

/// Synchronous replies travel back in the TwiML body; everything else is
/// answered later by the pipeline.
fn handle(state: &AppState, msg: &InboundMessage, channel: Channel) -> anyhow::Result<String> {
    let phone = strip_channel_prefix(&msg.from);
    let Some(user) = state.store.user_by_phone(phone) else {
        info!(
            from = %anon_hash(phone),
            message_sid = %msg.message_sid,
            "unregistered_user_message"
        );
        return twiml::message(WELCOME_TEXT);
    };

    let command = msg.body.trim().to_uppercase();
    if OPT_OUT.contains(&command.as_str()) {
        state.store.set_user_active(user.user_id, false);
        info!(user_id = %user.user_id, "user_opted_out");
        return twiml::message(UNSUBSCRIBED_TEXT);
    }
    if OPT_IN.contains(&command.as_str()) {
        return twiml::message(&opt_in(state, &user));
    }

    if !user.is_active {
        info!(user_id = %user.user_id, "inactive_user_message_ignored");
        return twiml::empty();
    }

    spawn_inbound(
        state.clone(),
        InboundEvent {
            user_id: user.user_id,
            text: msg.body.clone(),
            event_sid: msg.message_sid.clone(),
            channel,
        },
    );
    twiml::empty()
}

fn opt_in(state: &AppState, user: &User) -> String {
    if user.is_active {
        format!(
            "Hi {}! I'm already here for you. What's on your mind today?",
            user.alias
        )
    } else {
        state.store.set_user_active(user.user_id, true);
        info!(user_id = %user.user_id, "user_opted_in");
        format!(
            "Welcome back, {}! I'm here to support you. How are you feeling today?",
            user.alias
        )
    }
}
