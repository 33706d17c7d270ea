//! Crisis watchdog: an emergency session that no mentor has picked up within
//! `CRISIS_RESPONSE_TIMEOUT_MINUTES` gets a proactive call, which lands on
//! `/voice/outbound/{user_id}`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::logging::anon_hash;
use crate::state::AppState;
use crate::store::models::{SessionType, PENDING_MENTOR};

pub const WATCHDOG_INTERVAL_SECS: u64 = 60;

/// Place one call per overdue emergency session. Returns calls placed.
pub async fn call_unanswered_crises(state: &AppState, now: DateTime<Utc>) -> usize {
    let timeout = chrono::Duration::minutes(i64::from(state.settings.crisis_response_timeout_minutes));
    let overdue: Vec<_> = state
        .store
        .active_sessions()
        .into_iter()
        .filter(|s| s.session_type == SessionType::Emergency && s.mentor_id == PENDING_MENTOR)
        .filter(|s| now - s.started_at >= timeout)
        .collect();

    let mut placed = 0usize;
    for session in overdue {
        let Some(user) = state.store.user(session.user_id).filter(|u| u.is_active) else {
            continue;
        };
        let key = format!("crisis-call:{}", session.task_sid);
        if !state.store.claim_event(&key, now) {
            continue;
        }
        warn!(
            task_sid = %session.task_sid,
            user_id = %user.user_id,
            waited_minutes = (now - session.started_at).num_minutes(),
            "crisis_unanswered"
        );
        match state
            .telephony
            .make_outbound_call(&user.phone, &user.user_id.to_string())
            .await
        {
            Ok(call_sid) => {
                placed += 1;
                counter!("arc_crisis_calls_total").increment(1);
                info!(
                    to = %anon_hash(&user.phone),
                    call_sid = %call_sid,
                    task_sid = %session.task_sid,
                    "outbound_call_initiated"
                );
            }
            Err(e) => {
                // Next tick tries again.
                state.store.release_event(&key);
                error!(
                    to = %anon_hash(&user.phone),
                    task_sid = %session.task_sid,
                    error = %e,
                    "outbound_call_failed"
                );
            }
        }
    }
    placed
}

pub fn spawn_crisis_watchdog(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(WATCHDOG_INTERVAL_SECS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let placed = call_unanswered_crises(&state, now).await;
            gauge!("arc_crisis_watchdog_last_run_ts").set(now.timestamp() as f64);
            tracing::debug!(target: "watchdog", placed, "crisis watchdog tick");
        }
    })
}
