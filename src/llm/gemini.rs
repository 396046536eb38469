use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::GenerationError;
use crate::llm::media::{GeneratedImage, ImageInput};
use crate::llm::ImageGenerator;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const ERROR_BODY_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub struct GeminiImageConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiImageConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            api_base: config.gemini_api_base.clone(),
            model: config.gemini_image_model.clone(),
            timeout: config.generation_timeout(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

// Parts are matched by field presence; unknown part kinds deserialize to an empty part.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

pub struct GeminiImageClient {
    config: GeminiImageConfig,
    client: Client,
}

impl GeminiImageClient {
    pub fn new(config: GeminiImageConfig) -> Self {
        Self {
            config,
            client: get_http_client().clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.config.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    async fn call_api(&self, payload: Value) -> Result<GeminiResponse, GenerationError> {
        let timeout = self.config.timeout;
        let response = match self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!("Gemini request timed out after {}s", timeout.as_secs());
                return Err(GenerationError::Timeout(timeout));
            }
            Err(err) => {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (connect={})",
                    err_text,
                    err.is_connect()
                );
                return Err(GenerationError::Transport(err_text));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) if err.is_timeout() => return Err(GenerationError::Timeout(timeout)),
            Err(err) => {
                return Err(GenerationError::Transport(
                    self.redact_api_key(&err.to_string()),
                ))
            }
        };

        if !status.is_success() {
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            return Err(GenerationError::Remote {
                status: status.as_u16(),
                body: message.unwrap_or(body_summary),
            });
        }

        let parsed = serde_json::from_str::<GeminiResponse>(&body).map_err(|err| {
            GenerationError::Internal(format!("Failed to parse Gemini response: {err}"))
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model = %self.config.model, response = %summarize_response(&parsed));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    async fn generate(
        &self,
        prompt: &str,
        images: &[ImageInput],
    ) -> Result<GeneratedImage, GenerationError> {
        if !self.is_configured() {
            return Err(GenerationError::Config("GEMINI_API_KEY is not set".to_string()));
        }
        if prompt.trim().is_empty() {
            return Err(GenerationError::MissingInput("Prompt text is empty".to_string()));
        }
        if images.is_empty() {
            return Err(GenerationError::MissingInput(
                "At least one image attachment is required".to_string(),
            ));
        }

        let payload = build_image_payload(prompt, images);
        let metadata = json!({ "attachments": images.len() });
        log_llm_timing(
            "gemini",
            &self.config.model,
            "generate_image",
            Some(metadata),
            move || async move {
                let response = self.call_api(payload).await?;
                extract_first_image(&response).ok_or(GenerationError::NoImageReturned)
            },
        )
        .await
    }
}

fn build_image_payload(prompt: &str, images: &[ImageInput]) -> Value {
    let mut parts = vec![json!({ "text": prompt })];
    for image in images {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": general_purpose::STANDARD.encode(&image.bytes)
            }
        }));
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"]
        }
    })
}

/// First image-bearing part in candidate order, then part order.
fn extract_first_image(response: &GeminiResponse) -> Option<GeneratedImage> {
    response
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.inline_data.as_ref())
        .find_map(|inline_data| {
            let mime_type = inline_data.mime_type.trim();
            if !mime_type.is_empty() && !mime_type.starts_with("image/") {
                return None;
            }
            let data = inline_data.data.trim();
            if data.is_empty() {
                return None;
            }
            let bytes = general_purpose::STANDARD.decode(data).ok()?;
            if bytes.is_empty() {
                return None;
            }
            let mime_type = if mime_type.is_empty() {
                "image/png".to_string()
            } else {
                mime_type.to_string()
            };
            Some(GeneratedImage { bytes, mime_type })
        })
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    for candidate in &response.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in &content.parts {
            if let Some(text) = &part.text {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
            if part.inline_data.is_some() {
                image_parts += 1;
            }
        }
    }

    json!({
        "candidates": response.candidates.len(),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
            .map(|v| truncate_for_log(v, ERROR_BODY_LIMIT));
        return (message, truncate_for_log(&value.to_string(), ERROR_BODY_LIMIT));
    }

    (None, truncate_for_log(trimmed, ERROR_BODY_LIMIT))
}
