//! Background sync: replays queued assessment submissions.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::http::Request;
use crate::network::Network;
use crate::queue::{PendingSubmission, SubmissionQueue};

/// Counts from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Replays pending submissions against the submission endpoint.
pub struct SyncManager {
    config: Arc<WorkerConfig>,
    network: Arc<dyn Network>,
    queue: Arc<dyn SubmissionQueue>,
}

impl SyncManager {
    #[must_use]
    pub fn new(
        config: Arc<WorkerConfig>,
        network: Arc<dyn Network>,
        queue: Arc<dyn SubmissionQueue>,
    ) -> Self {
        Self {
            config,
            network,
            queue,
        }
    }

    /// Handles a sync event. Tags other than the configured one are ignored
    /// and yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending queue cannot be read.
    pub async fn handle_sync(&self, tag: &str) -> Result<Option<SyncReport>> {
        log::info!("Background sync {tag}");
        if tag != self.config.sync_tag {
            return Ok(None);
        }
        self.replay().await.map(Some)
    }

    /// POSTs every pending submission in order, removing the ones the server
    /// accepts. One failure does not stop the rest of the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending queue cannot be read or the endpoint
    /// URL is invalid. Per-submission failures are counted, not returned.
    pub async fn replay(&self) -> Result<SyncReport> {
        let pending = self.queue.pending().await.inspect_err(|e| {
            log::error!("Background sync failed: {e}");
        })?;

        let mut report = SyncReport::default();
        if pending.is_empty() {
            return Ok(report);
        }
        let endpoint = self.config.resolve(&self.config.submission_endpoint)?;

        for submission in pending {
            report.attempted += 1;
            if self.submit(&endpoint, &submission).await {
                report.synced += 1;
            } else {
                report.failed += 1;
            }
        }

        log::info!(
            "Background sync finished: {} synced, {} left pending",
            report.synced,
            report.failed
        );
        Ok(report)
    }

    async fn submit(&self, endpoint: &reqwest::Url, submission: &PendingSubmission) -> bool {
        let body = match serde_json::to_vec(&submission.data) {
            Ok(body) => body,
            Err(e) => {
                log::error!("Cannot encode assessment {}: {e}", submission.id);
                return false;
            }
        };
        let request = Request::for_url(Method::POST, endpoint.clone())
            .with_header("Content-Type", "application/json")
            .with_body(body);

        match self.network.fetch(&request).await {
            Ok(response) if response.is_ok() => {
                if let Err(e) = self.queue.remove(&submission.id).await {
                    log::error!("Synced assessment {} but could not dequeue it: {e}", submission.id);
                }
                log::info!("Synced assessment {}", submission.id);
                true
            }
            Ok(response) => {
                log::warn!(
                    "Server rejected assessment {} with status {}",
                    submission.id,
                    response.status
                );
                false
            }
            Err(e) => {
                log::warn!("Failed to sync assessment {}: {e}", submission.id);
                false
            }
        }
    }
}

/// Tracks reachability and reports the offline-to-online edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityMonitor {
    online: bool,
}

impl ConnectivityMonitor {
    #[must_use]
    pub const fn new(online: bool) -> Self {
        Self { online }
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.online
    }

    /// Records a probe result. Returns true only when reachability returns.
    pub fn observe(&mut self, reachable: bool) -> bool {
        let came_back = reachable && !self.online;
        if self.online != reachable {
            log::info!("Origin is now {}", if reachable { "online" } else { "offline" });
        }
        self.online = reachable;
        came_back
    }
}

/// Replays once at startup, then probes `probe` every `interval` and replays
/// on every tick the origin is reachable, until `cancel` fires.
///
/// An empty queue costs no requests beyond the probe.
pub async fn run_sync_loop(
    sync: Arc<SyncManager>,
    network: Arc<dyn Network>,
    probe: Request,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut monitor = ConnectivityMonitor::new(true);
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // consume the immediate first tick

    if let Err(e) = sync.handle_sync(&sync.config.sync_tag).await {
        log::error!("Startup sync failed: {e}");
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                log::info!("Stopping background sync loop");
                break;
            }
            _ = ticker.tick() => {
                let reachable = network.fetch(&probe).await.is_ok();
                monitor.observe(reachable);
                if reachable
                    && let Err(e) = sync.handle_sync(&sync.config.sync_tag).await
                {
                    log::error!("Background sync failed: {e}");
                }
            }
        }
    }
}
