use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    MissingInput(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Missing configuration: {0}")]
    Config(String),

    #[error("Gemini request failed with status {status}")]
    Remote { status: u16, body: String },

    #[error("Gemini request could not be sent: {0}")]
    Transport(String),

    #[error("No image returned by Gemini")]
    NoImageReturned,

    #[error("Image generation failed: {0}")]
    GenerationFailed(String),

    #[error("Gemini request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerationError::MissingInput(_) | GenerationError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            GenerationError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GenerationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GenerationError::Config(_)
            | GenerationError::Remote { .. }
            | GenerationError::Transport(_)
            | GenerationError::NoImageReturned
            | GenerationError::GenerationFailed(_)
            | GenerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short form used when two branch failures are folded into one message.
    pub fn summary(&self) -> String {
        match self {
            GenerationError::Remote { status, body } => format!("status {status}: {body}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            GenerationError::Remote { body, .. } => {
                json!({ "error": self.to_string(), "details": body })
            }
            GenerationError::Internal(_) => json!({ "error": "Internal server error" }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("Failed to decode {which} image: {source}")]
    Decode {
        which: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode story image: {0}")]
    Encode(#[source] image::ImageError),
}
