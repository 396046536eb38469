use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /api/health
pub async fn health(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": app.campaign.service_name(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
