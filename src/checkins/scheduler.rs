use std::time::Duration;

use metrics::gauge;
use tokio::task::JoinHandle;

use super::service::send_due_checkins;
use crate::state::AppState;

/// Periodically prompt users whose check-in time has come. The first tick
/// fires immediately.
pub fn spawn_checkin_scheduler(state: AppState, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let sent = send_due_checkins(&state, now).await;
            gauge!("arc_checkin_scheduler_last_run_ts").set(now.timestamp() as f64);
            tracing::debug!(target: "checkins", sent, "checkin scheduler tick");
        }
    })
}
