use axum::extract::State;
use axum::response::Response;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use crate::errors::GenerationError;
use crate::handlers::no_store;
use crate::state::AppState;
use crate::utils::timing::start_request_timer;

/// GET /api/test-story: story composed from mock portraits.
pub async fn test_story(State(app): State<AppState>) -> Result<Response, GenerationError> {
    let mut timer = start_request_timer("/api/test-story", app.campaign.slug());
    let story = app.orchestrator.compose_preview().await.inspect_err(|err| {
        timer.mark_status("error", Some(err.to_string()));
    })?;
    Ok(no_store(Json(json!({
        "storyComparison": STANDARD.encode(story),
        "message": "Test story generated from mock portraits",
    }))))
}
