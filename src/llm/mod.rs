pub mod gemini;
pub mod media;

use async_trait::async_trait;

use crate::errors::GenerationError;
use media::{GeneratedImage, ImageInput};

pub use gemini::{GeminiImageClient, GeminiImageConfig};

/// Remote image model seam: one prompt plus one or two reference images in, one image out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Whether the credential needed for `generate` is present.
    fn is_configured(&self) -> bool;

    async fn generate(
        &self,
        prompt: &str,
        images: &[ImageInput],
    ) -> Result<GeneratedImage, GenerationError>;
}
