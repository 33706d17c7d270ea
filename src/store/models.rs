//! Persistent entities.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::risk::RiskLevel;
use crate::telephony::Channel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    /// E.164 number without any channel prefix.
    pub phone: String,
    pub alias: String,
    pub is_active: bool,
    /// Offset of the user's local time from UTC.
    pub utc_offset_minutes: i32,
}

impl User {
    pub fn new(phone: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            phone: phone.into(),
            alias: alias.into(),
            is_active: true,
            utc_offset_minutes: 0,
        }
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Invalid offsets (beyond ±24h) degrade to UTC.
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: Uuid,
    /// Local "HH:MM".
    pub checkin_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandledBy {
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "AI_escalation")]
    AiEscalation,
    #[serde(rename = "AI_proactive")]
    AiProactive,
    #[serde(rename = "AI_checkin")]
    AiCheckin,
    #[serde(rename = "mentor")]
    Mentor,
    #[serde(rename = "system")]
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: u64,
    pub user_id: Uuid,
    pub channel: Channel,
    pub direction: Direction,
    pub text: String,
    pub risk_score: Option<f32>,
    pub handled_by: Option<HandledBy>,
    /// Vendor event id (MessageSid, CallSid, ConversationSid).
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub user_id: Uuid,
    pub channel: Channel,
    pub direction: Direction,
    pub text: String,
    pub risk_score: Option<f32>,
    pub handled_by: Option<HandledBy>,
    pub session_id: Option<String>,
}

impl NewInteraction {
    pub fn inbound(user_id: Uuid, channel: Channel, text: impl Into<String>) -> Self {
        Self {
            user_id,
            channel,
            direction: Direction::Inbound,
            text: text.into(),
            risk_score: None,
            handled_by: None,
            session_id: None,
        }
    }

    pub fn outbound(
        user_id: Uuid,
        channel: Channel,
        text: impl Into<String>,
        handled_by: HandledBy,
    ) -> Self {
        Self {
            user_id,
            channel,
            direction: Direction::Outbound,
            text: text.into(),
            risk_score: None,
            handled_by: Some(handled_by),
            session_id: None,
        }
    }

    pub fn risk_score(mut self, score: f32) -> Self {
        self.risk_score = Some(score);
        self
    }

    pub fn session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn handled_by(mut self, by: HandledBy) -> Self {
        self.handled_by = Some(by);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskEventType {
    Crisis,
    HighRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: u64,
    pub user_id: Uuid,
    pub event_type: RiskEventType,
    pub risk_level: RiskLevel,
    pub source_interaction_id: Option<u64>,
    pub trigger_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRiskEvent {
    pub user_id: Uuid,
    pub event_type: RiskEventType,
    pub risk_level: RiskLevel,
    pub source_interaction_id: Option<u64>,
    pub trigger_keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    #[default]
    Chat,
    Voice,
    Emergency,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Chat => "chat",
            SessionType::Voice => "voice",
            SessionType::Emergency => "emergency",
        }
    }

    /// Text sessions get a shared conversation room once a mentor accepts.
    pub fn wants_conversation(&self) -> bool {
        matches!(self, SessionType::Chat | SessionType::Emergency)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Completed,
    Canceled,
}

pub const PENDING_MENTOR: &str = "pending";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorSession {
    pub id: u64,
    pub user_id: Uuid,
    pub mentor_id: String,
    pub session_type: SessionType,
    pub task_sid: String,
    pub conversation_sid: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<SessionOutcome>,
    pub duration_seconds: Option<i64>,
}

impl MentorSession {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Close the session; duration is measured from `started_at`.
    pub fn close(&mut self, outcome: SessionOutcome, at: DateTime<Utc>) {
        self.ended_at = Some(at);
        self.outcome = Some(outcome);
        self.duration_seconds = Some((at - self.started_at).num_seconds().max(0));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: u64,
    pub user_id: Uuid,
    pub craving_level: u8,
    pub mood_word: String,
    pub completed_plan: bool,
    pub wellness_score: f32,
    pub additional_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckIn {
    pub user_id: Uuid,
    pub craving_level: u8,
    pub mood_word: String,
    pub completed_plan: bool,
    pub wellness_score: f32,
    pub additional_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Streak {
    pub user_id: Uuid,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_checkins: u32,
    pub last_checkin_at: Option<DateTime<Utc>>,
}

impl Streak {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            total_checkins: 0,
            last_checkin_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopingResource {
    pub id: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub is_active: bool,
    pub usage_count: u32,
}
