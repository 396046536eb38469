use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::compose::StoryComposer;
use crate::config::{AGING_PROMPT, WITHOUT_SKINCARE_PROMPT, WITH_SKINCARE_PROMPT};
use crate::errors::GenerationError;
use crate::llm::media::{
    download_media, sniff_supported_image, GeneratedImage, ImageInput, UploadedImage,
};
use crate::llm::ImageGenerator;
use crate::pipeline::Campaign;
use crate::stats::StatsTracker;

/// Everything the comparison flow returns to the caller.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub original: UploadedImage,
    pub without: GeneratedImage,
    pub with: GeneratedImage,
    pub story: Option<Vec<u8>>,
}

pub struct Orchestrator {
    generator: Arc<dyn ImageGenerator>,
    composer: Arc<StoryComposer>,
    stats: Arc<StatsTracker>,
    campaign: Campaign,
    reference_asset_url: Option<String>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        composer: Arc<StoryComposer>,
        stats: Arc<StatsTracker>,
        campaign: Campaign,
        reference_asset_url: Option<String>,
    ) -> Self {
        Self {
            generator,
            composer,
            stats,
            campaign,
            reference_asset_url,
        }
    }

    pub fn campaign(&self) -> Campaign {
        self.campaign
    }

    fn validate(&self, upload: Option<UploadedImage>) -> Result<UploadedImage, GenerationError> {
        let upload = upload
            .filter(|image| !image.bytes.is_empty())
            .ok_or_else(|| GenerationError::MissingInput("No user image file".to_string()))?;
        if sniff_supported_image(&upload.bytes).is_none() {
            return Err(GenerationError::BadRequest(
                "Uploaded file is not a supported image (png, jpeg, webp or heic)".to_string(),
            ));
        }
        if !self.generator.is_configured() {
            return Err(GenerationError::Config("GEMINI_API_KEY".to_string()));
        }
        Ok(upload)
    }

    async fn attachments(&self, upload: &UploadedImage) -> Vec<ImageInput> {
        let mut attachments = vec![upload.clone()];
        if let Some(url) = self.reference_asset_url.as_deref() {
            match download_media(url).await {
                Some(bytes) if !bytes.is_empty() => attachments.push(ImageInput::new(bytes, "")),
                _ => warn!("Reference asset unavailable, continuing with the upload only: {url}"),
            }
        }
        attachments
    }

    /// Two-variant flow: both generations run to completion, then the story is composed.
    pub async fn handle_upload(
        &self,
        upload: Option<UploadedImage>,
    ) -> Result<ComparisonResult, GenerationError> {
        let upload = self.validate(upload)?;
        self.stats.record_upload();
        let started = Instant::now();
        let attachments = self.attachments(&upload).await;

        let (without, with) = tokio::join!(
            self.generator.generate(WITHOUT_SKINCARE_PROMPT, &attachments),
            self.generator.generate(WITH_SKINCARE_PROMPT, &attachments),
        );

        let (without, with) = match (without, with) {
            (Ok(without), Ok(with)) => (without, with),
            (without, with) => {
                self.stats.record_failure();
                let message = format!(
                    "without: {}; with: {}",
                    branch_outcome(&without),
                    branch_outcome(&with)
                );
                warn!("Comparison generation failed ({message})");
                return Err(GenerationError::GenerationFailed(message));
            }
        };

        let story = if self.campaign.composes_story() {
            self.compose_story(&without.bytes, &with.bytes).await
        } else {
            None
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.stats.record_success(elapsed_ms, story.is_some());
        info!(
            "Comparison generated in {elapsed_ms}ms (story={})",
            story.is_some()
        );

        Ok(ComparisonResult {
            original: upload,
            without,
            with,
            story,
        })
    }

    /// Single aged portrait; the generator error is returned unchanged.
    pub async fn handle_portrait(
        &self,
        upload: Option<UploadedImage>,
    ) -> Result<GeneratedImage, GenerationError> {
        let upload = self.validate(upload)?;
        self.stats.record_upload();
        let started = Instant::now();
        let attachments = self.attachments(&upload).await;

        match self.generator.generate(AGING_PROMPT, &attachments).await {
            Ok(image) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.stats.record_success(elapsed_ms, false);
                info!("Portrait generated in {elapsed_ms}ms");
                Ok(image)
            }
            Err(err) => {
                self.stats.record_failure();
                warn!("Portrait generation failed: {err}");
                Err(err)
            }
        }
    }

    /// Story built from mock portraits, without touching the remote model.
    pub async fn compose_preview(&self) -> Result<Vec<u8>, GenerationError> {
        let composer = Arc::clone(&self.composer);
        tokio::task::spawn_blocking(move || composer.compose_preview())
            .await
            .map_err(|err| GenerationError::Internal(format!("preview task failed: {err}")))?
            .map_err(|err| GenerationError::Internal(err.to_string()))
    }

    async fn compose_story(&self, top: &[u8], bottom: &[u8]) -> Option<Vec<u8>> {
        let composer = Arc::clone(&self.composer);
        let top = top.to_vec();
        let bottom = bottom.to_vec();
        match tokio::task::spawn_blocking(move || composer.compose(&top, &bottom)).await {
            Ok(Ok(bytes)) => Some(bytes),
            Ok(Err(err)) => {
                warn!("Story composition failed: {err}");
                None
            }
            Err(err) => {
                error!("Story composition task failed: {err}");
                None
            }
        }
    }
}

fn branch_outcome(result: &Result<GeneratedImage, GenerationError>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(err) => err.summary(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{CompositionLayout, StoryAssets};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};
    use parking_lot::Mutex;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::sync::Barrier;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Outcome = Result<Vec<u8>, u16>;

    struct FakeGenerator {
        configured: bool,
        without: Outcome,
        with: Outcome,
        calls: Mutex<Vec<(String, usize)>>,
        barrier: Option<Barrier>,
    }

    impl FakeGenerator {
        fn new(without: Outcome, with: Outcome) -> Self {
            Self {
                configured: true,
                without,
                with,
                calls: Mutex::new(Vec::new()),
                barrier: None,
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn generate(
            &self,
            prompt: &str,
            images: &[ImageInput],
        ) -> Result<GeneratedImage, GenerationError> {
            self.calls.lock().push((prompt.to_string(), images.len()));
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            let outcome = if prompt == WITH_SKINCARE_PROMPT {
                &self.with
            } else {
                &self.without
            };
            match outcome {
                Ok(bytes) => Ok(ImageInput::new(bytes.clone(), "image/png")),
                Err(status) => Err(GenerationError::Remote {
                    status: *status,
                    body: "quota exhausted".to_string(),
                }),
            }
        }
    }

    fn png(color: [u8; 4]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 60, Rgba(color)))
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn upload() -> Option<UploadedImage> {
        Some(ImageInput::new(png([10, 20, 30, 255]), "image/png"))
    }

    fn build(
        generator: FakeGenerator,
        campaign: Campaign,
        reference_asset_url: Option<String>,
    ) -> (Orchestrator, Arc<FakeGenerator>, Arc<StatsTracker>) {
        let generator = Arc::new(generator);
        let stats = Arc::new(StatsTracker::in_memory());
        let composer = Arc::new(StoryComposer::new(
            CompositionLayout::default(),
            campaign.design(),
            StoryAssets::none(),
        ));
        let orchestrator = Orchestrator::new(
            generator.clone(),
            composer,
            stats.clone(),
            campaign,
            reference_asset_url,
        );
        (orchestrator, generator, stats)
    }

    #[tokio::test]
    async fn missing_upload_is_rejected_before_counting() {
        let (orchestrator, generator, stats) = build(
            FakeGenerator::new(Ok(png([1, 1, 1, 255])), Ok(png([2, 2, 2, 255]))),
            Campaign::Collamin,
            None,
        );
        let err = orchestrator.handle_upload(None).await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingInput(_)));

        let empty = Some(ImageInput::new(Vec::new(), "image/png"));
        let err = orchestrator.handle_upload(empty).await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingInput(_)));

        assert_eq!(stats.snapshot().total_uploads, 0);
        assert!(generator.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected_before_counting() {
        let (orchestrator, generator, stats) = build(
            FakeGenerator::new(Ok(png([1, 1, 1, 255])), Ok(png([2, 2, 2, 255]))),
            Campaign::IceBall,
            None,
        );
        let text = Some(ImageInput::new(b"hello world".to_vec(), "image/png"));
        let err = orchestrator.handle_portrait(text).await.unwrap_err();
        assert!(matches!(err, GenerationError::BadRequest(_)));

        assert_eq!(stats.snapshot().total_uploads, 0);
        assert!(generator.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_leaves_counters_untouched() {
        let mut fake = FakeGenerator::new(Ok(png([1, 1, 1, 255])), Ok(png([2, 2, 2, 255])));
        fake.configured = false;
        let (orchestrator, generator, stats) = build(fake, Campaign::Collamin, None);

        let err = orchestrator.handle_upload(upload()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Config(ref name) if name == "GEMINI_API_KEY"));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_uploads, 0);
        assert_eq!(snapshot.failed_generations, 0);
        assert!(generator.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn both_variants_and_story_are_returned() {
        let (orchestrator, generator, stats) = build(
            FakeGenerator::new(Ok(png([200, 0, 0, 255])), Ok(png([0, 200, 0, 255]))),
            Campaign::Collamin,
            None,
        );
        let result = orchestrator.handle_upload(upload()).await.unwrap();

        assert_eq!(result.without.bytes, png([200, 0, 0, 255]));
        assert_eq!(result.with.bytes, png([0, 200, 0, 255]));
        let story = image::load_from_memory(&result.story.unwrap()).unwrap();
        assert_eq!((story.width(), story.height()), (1080, 1920));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_uploads, 1);
        assert_eq!(snapshot.successful_generations, 1);
        assert_eq!(snapshot.story_images_generated, 1);

        let calls = generator.calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, attachments)| *attachments == 1));
    }

    #[tokio::test]
    async fn generations_run_concurrently() {
        let mut fake = FakeGenerator::new(Ok(png([1, 1, 1, 255])), Ok(png([2, 2, 2, 255])));
        // Each call waits for the other, so a sequential join would never finish.
        fake.barrier = Some(Barrier::new(2));
        let (orchestrator, _, _) = build(fake, Campaign::Collamin, None);

        let result =
            tokio::time::timeout(Duration::from_secs(5), orchestrator.handle_upload(upload()))
                .await
                .expect("generations did not overlap");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn one_failed_branch_fails_the_request_after_both_settle() {
        let (orchestrator, generator, stats) = build(
            FakeGenerator::new(Ok(png([1, 1, 1, 255])), Err(429)),
            Campaign::Collamin,
            None,
        );
        let err = orchestrator.handle_upload(upload()).await.unwrap_err();
        match err {
            GenerationError::GenerationFailed(message) => {
                assert_eq!(message, "without: ok; with: status 429: quota exhausted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(generator.calls.lock().len(), 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_uploads, 1);
        assert_eq!(snapshot.failed_generations, 1);
        assert_eq!(snapshot.successful_generations, 0);
    }

    #[tokio::test]
    async fn undecodable_variants_still_succeed_without_story() {
        let (orchestrator, _, stats) = build(
            FakeGenerator::new(Ok(b"not an image".to_vec()), Ok(b"also not".to_vec())),
            Campaign::Collamin,
            None,
        );
        let result = orchestrator.handle_upload(upload()).await.unwrap();
        assert!(result.story.is_none());
        assert_eq!(result.without.bytes, b"not an image".to_vec());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successful_generations, 1);
        assert_eq!(snapshot.story_images_generated, 0);
    }

    #[tokio::test]
    async fn iceball_comparison_skips_story() {
        let (orchestrator, _, stats) = build(
            FakeGenerator::new(Ok(png([1, 1, 1, 255])), Ok(png([2, 2, 2, 255]))),
            Campaign::IceBall,
            None,
        );
        let result = orchestrator.handle_upload(upload()).await.unwrap();
        assert!(result.story.is_none());
        assert_eq!(stats.snapshot().story_images_generated, 0);
    }

    #[tokio::test]
    async fn portrait_uses_aging_prompt_and_propagates_remote_errors() {
        let (orchestrator, generator, stats) = build(
            FakeGenerator::new(Ok(png([5, 5, 5, 255])), Ok(png([6, 6, 6, 255]))),
            Campaign::IceBall,
            None,
        );
        let image = orchestrator.handle_portrait(upload()).await.unwrap();
        assert_eq!(image.bytes, png([5, 5, 5, 255]));
        assert_eq!(generator.calls.lock()[0].0, AGING_PROMPT);

        let (orchestrator, _, stats_failed) = build(
            FakeGenerator::new(Err(500), Ok(png([6, 6, 6, 255]))),
            Campaign::IceBall,
            None,
        );
        let err = orchestrator.handle_portrait(upload()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Remote { status: 500, .. }));
        assert_eq!(stats_failed.snapshot().failed_generations, 1);
        assert_eq!(stats.snapshot().successful_generations, 1);
    }

    #[tokio::test]
    async fn reference_asset_is_attached_when_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reference.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png([9, 9, 9, 255])))
            .mount(&server)
            .await;

        let (orchestrator, generator, _) = build(
            FakeGenerator::new(Ok(png([1, 1, 1, 255])), Ok(png([2, 2, 2, 255]))),
            Campaign::IceBall,
            Some(format!("{}/reference.png", server.uri())),
        );
        orchestrator.handle_portrait(upload()).await.unwrap();
        assert_eq!(generator.calls.lock()[0].1, 2);
    }

    #[tokio::test]
    async fn unreachable_reference_asset_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (orchestrator, generator, _) = build(
            FakeGenerator::new(Ok(png([1, 1, 1, 255])), Ok(png([2, 2, 2, 255]))),
            Campaign::IceBall,
            Some(format!("{}/missing.png", server.uri())),
        );
        orchestrator.handle_portrait(upload()).await.unwrap();
        assert_eq!(generator.calls.lock()[0].1, 1);
    }

    #[tokio::test]
    async fn preview_needs_no_generator() {
        let mut fake = FakeGenerator::new(Err(500), Err(500));
        fake.configured = false;
        let (orchestrator, generator, _) = build(fake, Campaign::Collamin, None);
        let bytes = orchestrator.compose_preview().await.unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
        assert!(generator.calls.lock().is_empty());
    }
}
