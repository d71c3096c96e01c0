//! Download State Store (C4) and Download Manager (C5): the depot's
//! concurrent, resumable transfer subsystem (§4.4, §4.5).

mod disk_space;
mod manager;
mod progress;
mod state_store;

pub use manager::{DownloadInfo, DownloadManager, DownloadManagerConfig};
pub use progress::{DownloadStatus, Progress, ProgressSink, ProgressThrottle, ThroughputEstimator};
pub use state_store::DownloadStateStore;
