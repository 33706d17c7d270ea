//! HTTP surface: vendor webhooks plus the dashboard and check-in JSON APIs.

pub mod checkins;
pub mod escalations;
pub mod messaging;
pub mod voice;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::models::User;

pub const SERVICE_NAME: &str = "arc-api";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(messaging::routes())
        .merge(voice::routes())
        .merge(escalations::routes())
        .merge(checkins::routes())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Look up a user by a path/query/body id; anything unknown or malformed is a 404.
fn find_user(state: &AppState, raw_id: &str) -> ApiResult<User> {
    Uuid::parse_str(raw_id.trim())
        .ok()
        .and_then(|id| state.store.user(id))
        .ok_or(ApiError::NotFound("User not found"))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "AI Recovery Companion is running!" }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
