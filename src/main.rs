//! ARC Recovery Companion: binary entrypoint.
//! Loads settings, installs tracing and hands the router to Shuttle.

use arc_companion::{config::Settings, logging::init_tracing};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env()?;
    init_tracing(&settings.log_level);

    let router = arc_companion::app(settings).await?;
    Ok(router.into())
}
