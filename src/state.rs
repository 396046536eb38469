use std::sync::Arc;

use crate::compose::{CompositionLayout, StoryAssets, StoryComposer};
use crate::config::Config;
use crate::llm::{GeminiImageClient, GeminiImageConfig, ImageGenerator};
use crate::pipeline::{Campaign, Orchestrator};
use crate::stats::StatsTracker;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub stats: Arc<StatsTracker>,
    pub campaign: Campaign,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, stats: Arc<StatsTracker>) -> Self {
        let campaign = orchestrator.campaign();
        Self {
            orchestrator,
            stats,
            campaign,
        }
    }

    /// Wires the Gemini client, story composer and stats store described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let campaign = config.campaign;
        let design = campaign.design();
        let assets = StoryAssets::discover(
            config.font_path.as_deref(),
            config.logo_path.as_deref(),
            &design.logo_file_name,
        );
        let composer = Arc::new(StoryComposer::new(
            CompositionLayout::default(),
            design,
            assets,
        ));

        let stats = Arc::new(match &config.stats_file {
            Some(path) => StatsTracker::with_persistence(path.clone()),
            None => StatsTracker::in_memory(),
        });

        let generator: Arc<dyn ImageGenerator> =
            Arc::new(GeminiImageClient::new(GeminiImageConfig::from_config(config)));

        let orchestrator = Arc::new(Orchestrator::new(
            generator,
            composer,
            stats.clone(),
            campaign,
            config.reference_asset_url(),
        ));
        Self::new(orchestrator, stats)
    }
}
