// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod ai;
pub mod api;
pub mod checkins;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod resources;
pub mod risk;
pub mod state;
pub mod store;
pub mod telephony;
pub mod twiml;
pub mod watchdog;

pub use crate::api::router;
pub use crate::state::AppState;

use axum::Router;
use tracing::info;

use crate::checkins::scheduler::spawn_checkin_scheduler;
use crate::config::{file::FileOverrides, Settings};
use crate::metrics::Metrics;
use crate::watchdog::spawn_crisis_watchdog;

/// Build the production router: file overrides, vendor clients, optional
/// `/metrics`, the crisis watchdog and the optional check-in ticker.
pub async fn app(mut settings: Settings) -> anyhow::Result<Router> {
    if let Some(overrides) = FileOverrides::load_default()? {
        overrides.apply(&mut settings);
        info!("phrase list overrides loaded");
    }

    let metrics_enabled = settings.metrics_enabled;
    let scheduler_secs = settings.checkin_scheduler_secs;
    let state = AppState::from_settings(settings)?;

    let mut router = api::router(state.clone());
    if metrics_enabled {
        router = router.merge(Metrics::install()?.router());
    }
    spawn_crisis_watchdog(state.clone());
    if let Some(secs) = scheduler_secs {
        spawn_checkin_scheduler(state.clone(), secs);
        info!(interval_secs = secs, "checkin scheduler started");
    }

    info!(
        environment = %state.settings.environment,
        crisis_keywords = state.settings.crisis_keywords.phrases().len(),
        metrics_enabled,
        "arc_api_ready"
    );
    Ok(router)
}
