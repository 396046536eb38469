pub mod models;
pub mod tracker;

pub use models::DownloadKind;
pub use tracker::StatsTracker;
