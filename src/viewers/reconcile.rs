//! Periodic viewer-count reconciliation
//!
//! Each tick walks a snapshot of the tracked streams, evicts stale viewers,
//! and either pushes the net viewer change to the store or, when the
//! broadcast has ended or vanished, forgets the stream entirely.

use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::store::{BroadcastRecord, StoreError};

use super::stats::HlsViewerStats;

/// Liveness of a tracked stream according to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Broadcast exists and is live
    Active,
    /// Broadcast exists but is no longer live
    Ended,
    /// Broadcast record no longer exists
    Zombie,
}

impl Liveness {
    /// Classify a store lookup result
    pub fn classify(record: Option<&BroadcastRecord>) -> Self {
        match record {
            Some(record) if record.status.is_broadcasting() => Liveness::Active,
            Some(_) => Liveness::Ended,
            None => Liveness::Zombie,
        }
    }
}

/// Outcome of one reconciliation tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Streams in the tick's snapshot
    pub streams_scanned: usize,
    /// Viewers removed for staleness
    pub viewers_evicted: usize,
    /// Viewer-count corrections accepted by the store
    pub deltas_applied: usize,
    /// Streams forgotten because their broadcast ended or vanished
    pub streams_purged: usize,
    /// Store lookups or updates that failed or timed out
    pub store_failures: usize,
}

impl ReconcileReport {
    /// Whether the tick changed anything locally or in the store
    pub fn has_changes(&self) -> bool {
        self.viewers_evicted > 0 || self.deltas_applied > 0 || self.streams_purged > 0
    }
}

impl HlsViewerStats {
    /// Run one reconciliation tick
    ///
    /// Store failures are logged and counted in the report; they never
    /// abort the tick. Concurrent calls are serialized, so ticks never
    /// overlap.
    pub async fn reconcile(&self) -> ReconcileReport {
        let _tick = self.tick_lock.lock().await;

        let stream_ids = self.presence.snapshot_stream_ids().await;
        let now = Instant::now();

        let mut report = ReconcileReport {
            streams_scanned: stream_ids.len(),
            ..Default::default()
        };

        for stream_id in &stream_ids {
            self.reconcile_stream(stream_id, now, &mut report).await;
        }

        report
    }

    async fn reconcile_stream(&self, stream_id: &str, now: Instant, report: &mut ReconcileReport) {
        // Evict before consuming increments so both sides of the delta
        // belong to this tick.
        let decrements = self
            .presence
            .evict_stale_and_count(stream_id, now, self.config.viewer_timeout)
            .await;
        let increments = self.ledger.take_and_reset(stream_id).await;
        report.viewers_evicted += decrements;

        let delta = i64::try_from(increments)
            .unwrap_or(i64::MAX)
            .saturating_sub(i64::try_from(decrements).unwrap_or(i64::MAX));

        let record = match self
            .with_store_timeout(self.store.lookup_broadcast(stream_id))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                report.store_failures += 1;
                tracing::warn!(
                    stream = stream_id,
                    error = %e,
                    dropped_delta = delta,
                    "Broadcast lookup failed, skipping viewer update"
                );
                return;
            }
        };

        match Liveness::classify(record.as_ref()) {
            Liveness::Active => {
                if delta == 0 {
                    return;
                }

                match self
                    .with_store_timeout(self.store.apply_viewer_count_delta(stream_id, delta))
                    .await
                {
                    Ok(()) => {
                        report.deltas_applied += 1;
                        tracing::debug!(
                            stream = stream_id,
                            delta = delta,
                            increments = increments,
                            decrements = decrements,
                            "Updated HLS viewer count"
                        );
                    }
                    Err(e) => {
                        report.store_failures += 1;
                        tracing::warn!(
                            stream = stream_id,
                            error = %e,
                            delta = delta,
                            "HLS viewer count update failed"
                        );
                    }
                }
            }
            liveness @ (Liveness::Ended | Liveness::Zombie) => {
                self.purge_stream(stream_id).await;
                report.streams_purged += 1;

                tracing::info!(
                    stream = stream_id,
                    liveness = ?liveness,
                    status = record.as_ref().map(|r| r.status.as_str()).unwrap_or("missing"),
                    "Stream no longer broadcasting, HLS viewers cleared"
                );
            }
        }
    }

    async fn with_store_timeout<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let limit = self.config.store_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(limit)))
    }

    /// Spawn the background reconciliation task
    ///
    /// The first tick runs one interval after spawning. Ticks never overlap:
    /// a slow tick delays the next one instead of running concurrently.
    /// Only one task runs per engine; spawning again stops the previous
    /// task. Cancelling `shutdown` stops the task, abandoning any in-flight
    /// store call.
    pub fn spawn_reconcile_task(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let stats = Arc::clone(self);
        let period = stats.config().reconcile_interval.max(Duration::from_millis(1));
        let shutdown = shutdown.child_token();

        let previous = self
            .task_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(shutdown.clone());
        if let Some(previous) = previous {
            tracing::warn!("Replacing running HLS viewer reconciliation task");
            previous.cancel();
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_ms = saturating_millis(period),
                timeout_ms = saturating_millis(stats.config().viewer_timeout),
                "HLS viewer reconciliation started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    report = stats.reconcile() => {
                        if report.has_changes() || report.store_failures > 0 {
                            tracing::debug!(?report, "HLS viewer reconciliation tick");
                        }
                    }
                }
            }

            tracing::info!("HLS viewer reconciliation stopped");
        })
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
