use std::time::Duration;

use tracing::warn;

use crate::utils::http::get_http_client;

const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;
const MEDIA_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Image bytes plus the MIME type they are sent or received as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    /// Builds an attachment, trusting the declared type only when the remote API accepts it.
    pub fn new(bytes: Vec<u8>, declared_mime: &str) -> Self {
        let mime_type = resolve_image_mime(declared_mime, &bytes);
        Self { bytes, mime_type }
    }
}

pub type UploadedImage = ImageInput;
pub type GeneratedImage = ImageInput;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

pub fn is_supported_image_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

/// MIME type of `data` when its signature is a raster format the remote model accepts.
pub fn sniff_supported_image(data: &[u8]) -> Option<String> {
    if let Some(detected) = detect_mime_type(data)
        .map(|mime| normalize_image_mime(&mime))
        .filter(|mime| is_supported_image_mime(mime))
    {
        return Some(detected);
    }
    match image::guess_format(data) {
        Ok(image::ImageFormat::Png) => Some("image/png".to_string()),
        Ok(image::ImageFormat::Jpeg) => Some("image/jpeg".to_string()),
        Ok(image::ImageFormat::WebP) => Some("image/webp".to_string()),
        _ => None,
    }
}

fn resolve_image_mime(declared: &str, data: &[u8]) -> String {
    let mut candidates = Vec::new();
    if !declared.trim().is_empty() {
        candidates.push(declared.to_string());
    }
    if let Some(detected) = detect_mime_type(data) {
        candidates.push(detected);
    }

    candidates
        .into_iter()
        .map(|candidate| normalize_image_mime(&candidate))
        .find(|candidate| is_supported_image_mime(candidate))
        .unwrap_or_else(|| "image/png".to_string())
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Single-attempt download; failures are logged and reported as `None`.
pub async fn download_media(url: &str) -> Option<Vec<u8>> {
    let client = get_http_client();
    let response = match client
        .get(url)
        .timeout(MEDIA_DOWNLOAD_TIMEOUT)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(err) => {
            warn!(
                "Failed to fetch media {url}: {err} (timeout={}, connect={}, status={:?})",
                err.is_timeout(),
                err.is_connect(),
                err.status()
            );
            return None;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(
            "Media download failed for {url} with status {}: {}",
            status,
            truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
        );
        return None;
    }

    match response.bytes().await {
        Ok(bytes) if !bytes.is_empty() => Some(bytes.to_vec()),
        Ok(_) => {
            warn!("Media download for {url} returned an empty body");
            None
        }
        Err(err) => {
            warn!("Failed to read media bytes {url}: {err}");
            None
        }
    }
}
