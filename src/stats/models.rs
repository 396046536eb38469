use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadKind {
    StoryComparison,
    FutureWith,
    FutureWithout,
    Portrait,
}

impl DownloadKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "storyComparison" | "story_comparison" | "story" => Some(DownloadKind::StoryComparison),
            "futureWith" | "future_with" | "futureWithCollamin" => Some(DownloadKind::FutureWith),
            "futureWithout" | "future_without" | "futureWithoutCollamin" => {
                Some(DownloadKind::FutureWithout)
            }
            "portrait" => Some(DownloadKind::Portrait),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadCounts {
    pub story_comparison: u64,
    pub future_with: u64,
    pub future_without: u64,
    pub portrait: u64,
}

impl DownloadCounts {
    pub fn total(&self) -> u64 {
        self.story_comparison + self.future_with + self.future_without + self.portrait
    }

    pub fn increment(&mut self, kind: DownloadKind) {
        match kind {
            DownloadKind::StoryComparison => self.story_comparison += 1,
            DownloadKind::FutureWith => self.future_with += 1,
            DownloadKind::FutureWithout => self.future_without += 1,
            DownloadKind::Portrait => self.portrait += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayBucket {
    pub uploads: u64,
    pub successes: u64,
    pub failures: u64,
    pub downloads: u64,
}

/// Raw counters as persisted in the stats file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsData {
    pub total_uploads: u64,
    pub total_generations: u64,
    pub successful_generations: u64,
    pub failed_generations: u64,
    pub total_processing_time_ms: u64,
    pub story_images_generated: u64,
    pub downloads: DownloadCounts,
    pub daily: BTreeMap<String, DayBucket>,
    /// Uploads by local hour of day.
    pub hourly: Vec<u64>,
    pub first_event_time: Option<DateTime<Utc>>,
    pub last_event_time: Option<DateTime<Utc>>,
    pub last_reset_time: DateTime<Utc>,
}

impl Default for StatsData {
    fn default() -> Self {
        Self {
            total_uploads: 0,
            total_generations: 0,
            successful_generations: 0,
            failed_generations: 0,
            total_processing_time_ms: 0,
            story_images_generated: 0,
            downloads: DownloadCounts::default(),
            daily: BTreeMap::new(),
            hourly: vec![0; HOURS_PER_DAY],
            first_event_time: None,
            last_event_time: None,
            last_reset_time: Utc::now(),
        }
    }
}

impl StatsData {
    /// Repairs shape after loading an older or hand-edited file.
    pub fn normalize(mut self) -> Self {
        self.hourly.resize(HOURS_PER_DAY, 0);
        self
    }

    pub fn average_processing_seconds(&self) -> f64 {
        if self.successful_generations == 0 {
            return 0.0;
        }
        let seconds =
            self.total_processing_time_ms as f64 / self.successful_generations as f64 / 1000.0;
        round_one_decimal(seconds)
    }

    pub fn success_rate(&self) -> f64 {
        percentage(self.successful_generations, self.total_generations)
    }

    pub fn conversion_rate(&self) -> f64 {
        percentage(self.downloads.total(), self.successful_generations)
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round_one_decimal(numerator as f64 / denominator as f64 * 100.0)
}

/// Dashboard view served by `/api/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_uploads: u64,
    pub total_generations: u64,
    pub successful_generations: u64,
    pub failed_generations: u64,
    pub average_processing_time: f64,
    pub story_images_generated: u64,
    pub total_downloads: u64,
    pub last_reset_time: DateTime<Utc>,
}

impl From<&StatsData> for StatsSnapshot {
    fn from(data: &StatsData) -> Self {
        Self {
            total_uploads: data.total_uploads,
            total_generations: data.total_generations,
            successful_generations: data.successful_generations,
            failed_generations: data.failed_generations,
            average_processing_time: data.average_processing_seconds(),
            story_images_generated: data.story_images_generated,
            total_downloads: data.downloads.total(),
            last_reset_time: data.last_reset_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub total_uploads: u64,
    pub total_generations: u64,
    pub total_downloads: u64,
    pub success_rate: f64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGenerationStats {
    pub successful_generations: u64,
    pub failed_generations: u64,
    pub average_processing_time: f64,
    pub story_images_generated: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: String,
    pub uploads: u64,
    pub successes: u64,
    pub failures: u64,
    pub downloads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyStats {
    pub hour: u32,
    pub uploads: u64,
}

/// Campaign analytics view served by `/api/analytics`; every rate is derived at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAnalytics {
    pub overview: AnalyticsOverview,
    pub ai_generation: AiGenerationStats,
    pub downloads: DownloadCounts,
    pub daily: Vec<DailyStats>,
    pub hourly: Vec<HourlyStats>,
    pub first_event_time: Option<DateTime<Utc>>,
    pub last_event_time: Option<DateTime<Utc>>,
    pub last_reset_time: DateTime<Utc>,
}

impl From<&StatsData> for CampaignAnalytics {
    fn from(data: &StatsData) -> Self {
        Self {
            overview: AnalyticsOverview {
                total_uploads: data.total_uploads,
                total_generations: data.total_generations,
                total_downloads: data.downloads.total(),
                success_rate: data.success_rate(),
                conversion_rate: data.conversion_rate(),
            },
            ai_generation: AiGenerationStats {
                successful_generations: data.successful_generations,
                failed_generations: data.failed_generations,
                average_processing_time: data.average_processing_seconds(),
                story_images_generated: data.story_images_generated,
            },
            downloads: data.downloads.clone(),
            daily: data
                .daily
                .iter()
                .map(|(date, bucket)| DailyStats {
                    date: date.clone(),
                    uploads: bucket.uploads,
                    successes: bucket.successes,
                    failures: bucket.failures,
                    downloads: bucket.downloads,
                })
                .collect(),
            hourly: data
                .hourly
                .iter()
                .take(HOURS_PER_DAY)
                .enumerate()
                .map(|(hour, uploads)| HourlyStats {
                    hour: hour as u32,
                    uploads: *uploads,
                })
                .collect(),
            first_event_time: data.first_event_time,
            last_event_time: data.last_event_time,
            last_reset_time: data.last_reset_time,
        }
    }
}
