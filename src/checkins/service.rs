use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::{
    follow_up_text, is_concerning, is_due, local_day_start, parse_checkin_time, prompt_text,
    response_text, streak_suffix, trend, wellness_score, CheckInAnswer, Trend,
};
use crate::metrics;
use crate::state::AppState;
use crate::store::models::{HandledBy, NewCheckIn, NewInteraction, Streak, User};
use crate::telephony::{deliver, Channel};

/// Previous check-ins considered for the trend bonus.
const HISTORY: usize = 7;
const NEUTRAL_SCORE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInResult {
    pub wellness_score: f32,
    pub current_streak: u32,
    pub response_sent: bool,
}

/// Score and store a check-in, advance the streak, reply, and follow up on
/// concerning answers.
pub async fn process_checkin(
    state: &AppState,
    user: &User,
    answer: CheckInAnswer,
    channel: Channel,
    now: DateTime<Utc>,
) -> CheckInResult {
    let history: Vec<f32> = state
        .store
        .recent_checkins(user.user_id, HISTORY)
        .iter()
        .map(|c| c.wellness_score)
        .collect();
    let score = wellness_score(
        answer.craving_level,
        &answer.mood_word,
        answer.completed_plan,
        &history,
    );

    state.store.insert_checkin(
        NewCheckIn {
            user_id: user.user_id,
            craving_level: answer.craving_level,
            mood_word: answer.mood_word.clone(),
            completed_plan: answer.completed_plan,
            wellness_score: score,
            additional_notes: answer.additional_notes.clone(),
        },
        now,
    );

    let mut streak = state
        .store
        .streak(user.user_id)
        .unwrap_or_else(|| Streak::empty(user.user_id));
    streak.record(now, user.offset());
    let current_streak = streak.current_streak;
    state.store.save_streak(streak);

    info!(
        user_id = %user.user_id,
        craving_level = answer.craving_level,
        completed_plan = answer.completed_plan,
        wellness_score = score,
        current_streak,
        "checkin_processed"
    );

    let text = format!(
        "{}{}",
        response_text(score, &answer.mood_word),
        streak_suffix(current_streak)
    );
    let sent = deliver(state.telephony.as_ref(), channel, &user.phone, &text).await;
    state.store.insert_interaction(NewInteraction::outbound(
        user.user_id,
        channel,
        text,
        HandledBy::AiCheckin,
    ));

    if is_concerning(score, answer.craving_level) {
        let follow_up = follow_up_text(score, answer.craving_level);
        deliver(state.telephony.as_ref(), channel, &user.phone, follow_up).await;
        state.store.insert_interaction(NewInteraction::outbound(
            user.user_id,
            channel,
            follow_up,
            HandledBy::AiCheckin,
        ));
        info!(
            user_id = %user.user_id,
            wellness_score = score,
            craving_level = answer.craving_level,
            "concerning_checkin_follow_up_sent"
        );
    }

    CheckInResult {
        wellness_score: score,
        current_streak,
        response_sent: sent.is_some(),
    }
}

/// Prompt every active user whose preferred time is now in their local time
/// and who has not checked in yet today. Returns how many prompts went out.
pub async fn send_due_checkins(state: &AppState, now: DateTime<Utc>) -> usize {
    let candidates = state.store.users_with_preferences();
    let mut sent = 0usize;

    for (user, pref) in &candidates {
        let Some(preferred) = parse_checkin_time(&pref.checkin_time) else {
            error!(
                user_id = %user.user_id,
                checkin_time = %pref.checkin_time,
                "individual_checkin_send_error"
            );
            continue;
        };
        let offset = user.offset();
        let local = now.with_timezone(&offset);
        if !is_due(local.time(), preferred) {
            continue;
        }
        let today_start = local_day_start(now, offset);
        if !state
            .store
            .checkins_since(user.user_id, today_start)
            .is_empty()
        {
            continue;
        }
        // One prompt per user per local day, however often the sender runs.
        let key = format!("checkin-prompt:{}:{}", user.user_id, local.date_naive());
        if !state.store.claim_event(&key, now) {
            continue;
        }

        let text = prompt_text(&user.alias);
        if deliver(state.telephony.as_ref(), Channel::Sms, &user.phone, &text)
            .await
            .is_none()
        {
            // Let the next run inside the window try again.
            state.store.release_event(&key);
            continue;
        }
        state.store.insert_interaction(NewInteraction::outbound(
            user.user_id,
            Channel::Sms,
            text,
            HandledBy::AiCheckin,
        ));
        sent += 1;
        info!(
            user_id = %user.user_id,
            local_time = %local.to_rfc3339(),
            "daily_checkin_sent"
        );
    }

    metrics::record_checkins_sent(sent);
    info!(
        total_sent = sent,
        total_users_checked = candidates.len(),
        "daily_checkins_batch_completed"
    );
    sent
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInSummary {
    pub user_id: Uuid,
    pub current_streak: u32,
    pub wellness_score: f32,
    pub last_checkin: Option<DateTime<Utc>>,
    pub trend: Trend,
}

pub fn summary(state: &AppState, user_id: Uuid, days: u32, now: DateTime<Utc>) -> CheckInSummary {
    let since = now - Duration::days(i64::from(days));
    let rows = state.store.checkins_since(user_id, since);
    let scores: Vec<f32> = rows.iter().map(|c| c.wellness_score).collect();
    CheckInSummary {
        user_id,
        current_streak: state
            .store
            .streak(user_id)
            .map(|s| s.current_streak)
            .unwrap_or(0),
        wellness_score: scores.first().copied().unwrap_or(NEUTRAL_SCORE),
        last_checkin: rows.first().map(|c| c.created_at),
        trend: trend(&scores),
    }
}
