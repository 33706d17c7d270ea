//! # Daily check-ins
//! Pure scoring, streak and scheduling rules. I/O lives in [`service`].
//!
//! Wellness score: base 0.5, plus up to 0.3 for low cravings, +0.2 / -0.1
//! for the plan, ±0.2 for a recognisably positive or negative mood word, and
//! a 0.1 bonus when the result beats the mean of the last three scores.

pub mod scheduler;
pub mod service;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::store::models::Streak;

pub const MAX_CRAVING_LEVEL: u8 = 3;
/// Minutes either side of the preferred time a prompt may go out.
pub const DUE_WINDOW_MINUTES: i64 = 15;
pub const TREND_WINDOW: usize = 3;
const TREND_MARGIN: f32 = 0.1;

const POSITIVE_MOODS: &[&str] = &[
    "good", "great", "happy", "peaceful", "strong", "hopeful", "grateful",
];
const NEGATIVE_MOODS: &[&str] = &[
    "bad", "awful", "depressed", "anxious", "angry", "lonely", "hopeless",
];

/// `recent` holds previous scores, newest first.
pub fn wellness_score(craving_level: u8, mood_word: &str, completed_plan: bool, recent: &[f32]) -> f32 {
    let craving = f32::from(MAX_CRAVING_LEVEL.saturating_sub(craving_level.min(MAX_CRAVING_LEVEL)));
    let craving_impact = craving / f32::from(MAX_CRAVING_LEVEL) * 0.3;
    let plan_impact = if completed_plan { 0.2 } else { -0.1 };

    let mood = mood_word.to_lowercase();
    let mood_impact = if POSITIVE_MOODS.iter().any(|m| mood.contains(m)) {
        0.2
    } else if NEGATIVE_MOODS.iter().any(|m| mood.contains(m)) {
        -0.2
    } else {
        0.0
    };

    let current = 0.5 + craving_impact + plan_impact + mood_impact;
    let trend_bonus = if recent.len() >= TREND_WINDOW {
        let window = &recent[..TREND_WINDOW];
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        if current > mean {
            0.1
        } else {
            0.0
        }
    } else {
        0.0
    };

    (current + trend_bonus).clamp(0.0, 1.0)
}

pub fn response_text(score: f32, mood_word: &str) -> String {
    if score >= 0.8 {
        format!("Wonderful to hear you're feeling {mood_word}! Your strength is really showing. Keep up the amazing work! 🌟")
    } else if score >= 0.6 {
        "Thanks for checking in. It sounds like you're managing well today. Remember, progress isn't always linear - you're doing great.".to_string()
    } else if score >= 0.4 {
        format!("I appreciate your honesty about feeling {mood_word}. That takes courage. What's one small thing that might help you feel a bit better today?")
    } else {
        format!("I hear you're having a tough time feeling {mood_word}. You're not alone in this. Would you like to try a quick grounding exercise or talk to someone?")
    }
}

pub fn streak_suffix(current_streak: u32) -> String {
    if current_streak > 1 {
        format!(" 🔥 {current_streak} day streak!")
    } else {
        String::new()
    }
}

pub fn is_concerning(score: f32, craving_level: u8) -> bool {
    score < 0.4 || craving_level >= MAX_CRAVING_LEVEL
}

pub fn follow_up_text(score: f32, craving_level: u8) -> &'static str {
    if craving_level >= MAX_CRAVING_LEVEL {
        "I noticed you're experiencing strong cravings today. That's really tough, and I'm proud of you for checking in. Would you like to try a quick grounding exercise, or would you prefer to talk to someone?"
    } else if score < 0.3 {
        "It sounds like today has been particularly challenging. Remember, difficult days don't mean you're not making progress. I'm here if you want to talk more, or I can connect you with a mentor."
    } else {
        "Thank you for your honest check-in. Sometimes we all have harder days. What's one small thing that might help you feel a bit better right now?"
    }
}

pub fn prompt_text(alias: &str) -> String {
    format!(
        "Good morning, {alias}! Time for your daily check-in 🌅\n\n\
         Reply with:\n\
         1. Cravings (0-3): How intense are any cravings today?\n\
         2. Mood: One word for how you're feeling\n\
         3. Plan: Did you complete your plan item yesterday? (YES/NO)\n\n\
         Example: Cravings 1; Mood hopeful; Plan YES"
    )
}

impl Streak {
    /// Count a check-in at `now`, with days measured in the user's local time.
    pub fn record(&mut self, now: DateTime<Utc>, offset: FixedOffset) {
        let today = now.with_timezone(&offset).date_naive();
        let last = self
            .last_checkin_at
            .map(|t| t.with_timezone(&offset).date_naive());

        match last {
            Some(d) if d == today => {}
            Some(d) if today.pred_opt() == Some(d) => self.current_streak += 1,
            _ => self.current_streak = 1,
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.total_checkins += 1;
        self.last_checkin_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

/// Mean of the three newest scores against the three before them.
pub fn trend(scores_newest_first: &[f32]) -> Trend {
    if scores_newest_first.len() < TREND_WINDOW * 2 {
        return Trend::Stable;
    }
    let mean = |s: &[f32]| s.iter().sum::<f32>() / s.len() as f32;
    let recent = mean(&scores_newest_first[..TREND_WINDOW]);
    let older = mean(&scores_newest_first[TREND_WINDOW..TREND_WINDOW * 2]);
    if recent > older + TREND_MARGIN {
        Trend::Improving
    } else if recent < older - TREND_MARGIN {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// `"HH:MM"`, 24h.
pub fn parse_checkin_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

/// Same hour and within [`DUE_WINDOW_MINUTES`] of the preferred minute.
pub fn is_due(local_now: NaiveTime, preferred: NaiveTime) -> bool {
    local_now.hour() == preferred.hour()
        && (i64::from(local_now.minute()) - i64::from(preferred.minute())).abs()
            <= DUE_WINDOW_MINUTES
}

/// UTC instant of the user's local midnight for the day containing `now`.
pub fn local_day_start(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_date = now.with_timezone(&offset).date_naive();
    match offset
        .from_local_datetime(&local_date.and_time(NaiveTime::default()))
        .single()
    {
        Some(t) => t.with_timezone(&Utc),
        // Fixed offsets are never ambiguous; keep a sane bound anyway.
        None => now - Duration::days(1),
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckInAnswer {
    pub craving_level: u8,
    pub mood_word: String,
    pub completed_plan: bool,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

static CRAVINGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcravings?\s*[:=\-]?\s*(\d+)").expect("static regex"));
static MOOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bmood\s*[:=\-]?\s*([\p{L}'\-]+)").expect("static regex"));
static PLAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bplan\s*[:=\-]?\s*(yes|no|y|n)\b").expect("static regex"));

/// Parse a texted reply such as `Cravings 1; Mood hopeful; Plan YES`.
/// All three parts are required.
pub fn parse_checkin_reply(text: &str) -> Option<CheckInAnswer> {
    let craving_level: u8 = CRAVINGS.captures(text)?.get(1)?.as_str().parse().ok()?;
    if craving_level > MAX_CRAVING_LEVEL {
        return None;
    }
    let mood_word = MOOD.captures(text)?.get(1)?.as_str().to_string();
    let plan = PLAN.captures(text)?.get(1)?.as_str().to_ascii_lowercase();
    Some(CheckInAnswer {
        craving_level,
        mood_word,
        completed_plan: plan.starts_with('y'),
        additional_notes: None,
    })
}
