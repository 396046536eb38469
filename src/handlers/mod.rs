pub mod generate;
pub mod health;
pub mod stats;
pub mod story;

use std::any::Any;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::errors::GenerationError;
use crate::state::AppState;
use crate::stats::StatsTracker;

pub(crate) fn no_store<T: IntoResponse>(body: T) -> Response {
    ([(header::CACHE_CONTROL, "no-store")], body).into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else {
        "unknown panic"
    }
}

/// A handler panic is logged, counted as a failed generation and answered with the generic 500.
fn panic_responder(
    stats: Arc<StatsTracker>,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |panic| {
        let message = panic_message(panic.as_ref()).to_string();
        error!("Request handler panicked: {message}");
        stats.record_failure();
        GenerationError::Internal(message).into_response()
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let stats = state.stats.clone();
    Router::new()
        .route("/api/generate", post(generate::generate))
        .route("/api/stats", get(stats::get_stats))
        .route("/api/stats/reset", post(stats::reset_stats))
        .route("/api/analytics", get(stats::get_analytics))
        .route("/api/track/download", post(stats::track_download))
        .route("/api/test-story", get(story::test_story))
        .route("/api/health", get(health::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CatchPanicLayer::custom(panic_responder(stats)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
