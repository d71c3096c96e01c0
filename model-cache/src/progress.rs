//! Progress reporting types and the EMA throughput estimator (§4.5.6).

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Initializing,
    Downloading,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Cancelled | DownloadStatus::Failed
        )
    }
}

#[derive(Debug, Clone)]
pub struct Progress {
    pub model_id: String,
    pub current_file_name: String,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub bytes_per_second: f64,
    pub estimated_time_remaining: Option<Duration>,
    pub status: DownloadStatus,
    pub error_message: Option<String>,
}

/// Exponential moving average of throughput, α=0.3 over 1s windows (§4.5.6).
pub struct ThroughputEstimator {
    alpha: f64,
    window: Duration,
    window_start: Instant,
    window_bytes: u64,
    ema_bytes_per_sec: f64,
}

impl ThroughputEstimator {
    pub fn new() -> Self {
        Self {
            alpha: 0.3,
            window: Duration::from_secs(1),
            window_start: Instant::now(),
            window_bytes: 0,
            ema_bytes_per_sec: 0.0,
        }
    }

    /// Record newly transferred bytes; returns the current EMA rate,
    /// updated once per rolling 1s window.
    pub fn record(&mut self, bytes: u64) -> f64 {
        self.window_bytes += bytes;
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.window {
            let instantaneous = self.window_bytes as f64 / elapsed.as_secs_f64();
            self.ema_bytes_per_sec = if self.ema_bytes_per_sec == 0.0 {
                instantaneous
            } else {
                self.alpha * instantaneous + (1.0 - self.alpha) * self.ema_bytes_per_sec
            };
            self.window_start = Instant::now();
            self.window_bytes = 0;
        }
        self.ema_bytes_per_sec
    }

    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        if self.ema_bytes_per_sec <= 0.0 {
            None
        } else {
            Some(Duration::from_secs_f64(
                remaining_bytes as f64 / self.ema_bytes_per_sec,
            ))
        }
    }
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Throttles progress emission to at most once per 250ms or 1% of file size
/// (§4.5.5b), whichever comes first.
pub struct ProgressThrottle {
    last_emit: Instant,
    last_emitted_bytes: u64,
    min_interval: Duration,
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self {
            last_emit: Instant::now() - Duration::from_secs(1),
            last_emitted_bytes: 0,
            min_interval: Duration::from_millis(250),
        }
    }

    pub fn should_emit(&mut self, downloaded: u64, total: u64) -> bool {
        let one_percent = (total / 100).max(1);
        let due_by_time = self.last_emit.elapsed() >= self.min_interval;
        let due_by_progress = downloaded.saturating_sub(self.last_emitted_bytes) >= one_percent;
        if due_by_time || due_by_progress {
            self.last_emit = Instant::now();
            self.last_emitted_bytes = downloaded;
            true
        } else {
            false
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// A sink that must never block the transfer loop for more than 100ms;
/// slow sinks silently drop notifications (§4.5.6).
pub type ProgressSink = std::sync::Arc<dyn Fn(Progress) + Send + Sync>;

pub fn notify(sink: Option<&ProgressSink>, progress: Progress) {
    if let Some(sink) = sink {
        sink(progress);
    }
}
