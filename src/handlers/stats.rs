use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::GenerationError;
use crate::handlers::no_store;
use crate::stats::DownloadKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub kind: String,
}

/// GET /api/stats
pub async fn get_stats(State(app): State<AppState>) -> Response {
    no_store(Json(app.stats.snapshot()))
}

/// GET /api/analytics
pub async fn get_analytics(State(app): State<AppState>) -> Response {
    no_store(Json(app.stats.analytics()))
}

/// POST /api/stats/reset
pub async fn reset_stats(State(app): State<AppState>) -> Response {
    app.stats.reset();
    no_store(Json(app.stats.snapshot()))
}

/// POST /api/track/download
pub async fn track_download(
    State(app): State<AppState>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let Json(body) = body.map_err(|err| GenerationError::BadRequest(err.body_text()))?;
    let kind = DownloadKind::parse(&body.kind)
        .ok_or_else(|| GenerationError::BadRequest(format!("Unknown download kind: {}", body.kind)))?;
    app.stats.record_download(kind);
    Ok(Json(json!({ "tracked": kind })))
}
