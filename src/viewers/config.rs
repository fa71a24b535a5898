//! Viewer statistics configuration

use std::time::Duration;

/// Default interval between reconciliation ticks
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default time after which a silent session no longer counts as a viewer
pub const DEFAULT_VIEWER_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Default upper bound for a single store call during a tick
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Segment durations a viewer may miss before being dropped
const SEGMENTS_PER_TIMEOUT: u64 = 10;

/// Viewer statistics configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerStatsConfig {
    /// Interval between reconciliation ticks
    pub reconcile_interval: Duration,

    /// A session not seen for longer than this is evicted
    pub viewer_timeout: Duration,

    /// Timeout applied to each store lookup and update
    pub store_timeout: Duration,
}

impl Default for ViewerStatsConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            viewer_timeout: DEFAULT_VIEWER_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl ViewerStatsConfig {
    /// Set the reconciliation interval
    pub fn reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Set the viewer timeout
    pub fn viewer_timeout(mut self, timeout: Duration) -> Self {
        self.viewer_timeout = timeout;
        self
    }

    /// Set the per-call store timeout
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Derive the viewer timeout from the application's HLS segment time
    ///
    /// `hls_time` is the raw settings value in seconds. A positive integer
    /// sets the timeout to ten segment durations; anything else leaves the
    /// current timeout in place.
    pub fn with_hls_segment_time(mut self, hls_time: Option<&str>) -> Self {
        let Some(raw) = hls_time.map(str::trim).filter(|s| !s.is_empty()) else {
            return self;
        };

        match raw.parse::<u64>() {
            Ok(0) => {
                tracing::debug!(hls_time = raw, "Ignoring zero HLS segment time");
            }
            Ok(secs) => {
                self.viewer_timeout = Duration::from_secs(secs.saturating_mul(SEGMENTS_PER_TIMEOUT));
            }
            Err(e) => {
                tracing::warn!(
                    hls_time = raw,
                    error = %e,
                    timeout_ms = u64::try_from(self.viewer_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Invalid HLS segment time, keeping viewer timeout"
                );
            }
        }

        self
    }
}
