use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::errors::GenerationError;
use crate::llm::media::{ImageInput, UploadedImage};
use crate::pipeline::ComparisonResult;
use crate::state::AppState;
use crate::utils::timing::start_request_timer;

const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    pub original_image: String,
    pub future_without_collamin: String,
    pub future_with_collamin: String,
    pub story_comparison: Option<String>,
}

impl From<&ComparisonResult> for ComparisonResponse {
    fn from(result: &ComparisonResult) -> Self {
        Self {
            original_image: STANDARD.encode(&result.original.bytes),
            future_without_collamin: STANDARD.encode(&result.without.bytes),
            future_with_collamin: STANDARD.encode(&result.with.bytes),
            story_comparison: result.story.as_ref().map(|story| STANDARD.encode(story)),
        }
    }
}

fn invalid_multipart(err: MultipartError) -> GenerationError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return GenerationError::PayloadTooLarge(format!("Upload too large: {}", err.body_text()));
    }
    GenerationError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}

/// First `image` field of the form, if any.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<UploadedImage>, GenerationError> {
    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let declared = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(invalid_multipart)?;
        return Ok(Some(ImageInput::new(bytes.to_vec(), &declared)));
    }
    Ok(None)
}

/// POST /api/generate
pub async fn generate(
    State(app): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GenerationError> {
    let mut timer = start_request_timer("/api/generate", app.campaign.slug());
    let result = respond(&app, multipart).await;
    if let Err(err) = &result {
        timer.mark_status("error", Some(err.summary()));
    }
    timer.log_completed();
    result
}

async fn respond(
    app: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GenerationError> {
    let mut multipart = multipart
        .map_err(|err| GenerationError::MissingInput(format!("No user image file: {}", err.body_text())))?;
    let upload = read_upload(&mut multipart).await?;

    if app.campaign.returns_raw_image() {
        let image = app.orchestrator.handle_portrait(upload).await?;
        let headers = [
            (header::CONTENT_TYPE, image.mime_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ];
        return Ok((headers, image.bytes).into_response());
    }

    let result = app.orchestrator.handle_upload(upload).await?;
    Ok(Json(ComparisonResponse::from(&result)).into_response())
}
