use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::{Local, Timelike, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::stats::models::{CampaignAnalytics, DownloadKind, StatsData, StatsSnapshot};

/// Process-wide usage counters.
///
/// Recording never fails the caller. With persistence enabled every mutation publishes the
/// full state to a single writer task, which keeps only the newest state pending.
pub struct StatsTracker {
    inner: Mutex<StatsData>,
    path: Option<PathBuf>,
    publisher: Option<watch::Sender<StatsData>>,
}

impl StatsTracker {
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(StatsData::default()),
            path: None,
            publisher: None,
        }
    }

    /// Loads `path` if present and spawns the writer task. Must run inside a tokio runtime.
    pub fn with_persistence(path: PathBuf) -> Self {
        let data = load_snapshot(&path);
        let (publisher, receiver) = watch::channel(data.clone());
        let writer_path = path.clone();
        tokio::spawn(async move {
            stats_writer(writer_path, receiver).await;
        });
        info!("Stats writer task started for {}", path.display());

        Self {
            inner: Mutex::new(data),
            path: Some(path),
            publisher: Some(publisher),
        }
    }

    fn mutate<F>(&self, update: F)
    where
        F: FnOnce(&mut StatsData),
    {
        let mut guard = self.inner.lock();
        update(&mut guard);
        if let Some(publisher) = &self.publisher {
            // Published under the lock so the writer never sees an older state last.
            publisher.send_replace(guard.clone());
        }
    }

    pub fn record_upload(&self) {
        let now = Local::now();
        self.mutate(|stats| {
            stats.total_uploads += 1;
            stats.daily.entry(day_key(&now)).or_default().uploads += 1;
            if let Some(slot) = stats.hourly.get_mut(now.hour() as usize) {
                *slot += 1;
            }
            touch(stats);
        });
    }

    pub fn record_success(&self, duration_ms: u64, story_produced: bool) {
        let now = Local::now();
        self.mutate(|stats| {
            stats.total_generations += 1;
            stats.successful_generations += 1;
            stats.total_processing_time_ms += duration_ms;
            if story_produced {
                stats.story_images_generated += 1;
            }
            stats.daily.entry(day_key(&now)).or_default().successes += 1;
            touch(stats);
        });
    }

    pub fn record_failure(&self) {
        let now = Local::now();
        self.mutate(|stats| {
            stats.total_generations += 1;
            stats.failed_generations += 1;
            stats.daily.entry(day_key(&now)).or_default().failures += 1;
            touch(stats);
        });
    }

    pub fn record_download(&self, kind: DownloadKind) {
        let now = Local::now();
        self.mutate(|stats| {
            stats.downloads.increment(kind);
            stats.daily.entry(day_key(&now)).or_default().downloads += 1;
            touch(stats);
        });
    }

    pub fn reset(&self) {
        self.mutate(|stats| {
            *stats = StatsData::default();
        });
        info!("Usage stats reset");
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::from(&*self.inner.lock())
    }

    pub fn analytics(&self) -> CampaignAnalytics {
        CampaignAnalytics::from(&*self.inner.lock())
    }

    pub fn raw(&self) -> StatsData {
        self.inner.lock().clone()
    }

    /// Writes the current state immediately, bypassing the writer task.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = self.raw();
        write_snapshot(path, &data).await
    }
}

fn day_key(now: &chrono::DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

fn touch(stats: &mut StatsData) {
    let now = Utc::now();
    if stats.first_event_time.is_none() {
        stats.first_event_time = Some(now);
    }
    stats.last_event_time = Some(now);
}

pub fn load_snapshot(path: &Path) -> StatsData {
    if !path.exists() {
        info!("No stats file at {}; starting fresh", path.display());
        return StatsData::default();
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("Failed to read stats file {}: {}", path.display(), err);
            return StatsData::default();
        }
    };

    match serde_json::from_str::<StatsData>(&raw) {
        Ok(data) => {
            info!("Loaded stats snapshot from {}", path.display());
            data.normalize()
        }
        Err(err) => {
            warn!("Failed to parse stats file {}: {}", path.display(), err);
            StatsData::default()
        }
    }
}

static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Sibling temp path unique to this process and write, so concurrent writers never share one.
fn temp_path_for(path: &Path) -> PathBuf {
    let sequence = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stats.json".to_string());
    path.with_file_name(format!(".{file_name}.{}.{sequence}.tmp", std::process::id()))
}

async fn write_snapshot(path: &Path, data: &StatsData) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(data)?;
    let tmp_path = temp_path_for(path);
    tokio::fs::write(&tmp_path, body)
        .await
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| {
            format!("renaming {} to {}", tmp_path.display(), path.display())
        });
    }
    Ok(())
}

async fn stats_writer(path: PathBuf, mut receiver: watch::Receiver<StatsData>) {
    while receiver.changed().await.is_ok() {
        let data = receiver.borrow_and_update().clone();
        if let Err(err) = write_snapshot(&path, &data).await {
            warn!("Error in stats_writer: {err:#}");
        }
    }
    info!("Stats writer task stopped");
}
