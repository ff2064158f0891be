//! Worker install and activation.

use std::fmt;
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;

use crate::cache::CacheStorage;
use crate::clients::Clients;
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::http::Request;
use crate::network::Network;

/// Where a worker version is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
    /// Install failed; this version will never activate.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Resources written to the static partition.
    pub cached: usize,
    /// The worker asks to skip the waiting period.
    pub skip_waiting: bool,
}

/// Outcome of activation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivateReport {
    /// Partitions purged because they belong to another version.
    pub deleted: Vec<String>,
    /// Pages taken under control.
    pub claimed: usize,
}

/// Drives install and activation for one worker version.
pub struct Lifecycle {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    state: Mutex<WorkerState>,
}

impl Lifecycle {
    #[must_use]
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<dyn Clients>,
    ) -> Self {
        Self {
            config,
            caches,
            network,
            clients,
            state: Mutex::new(WorkerState::Parsed),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.lock()
    }

    /// Pre-caches the static manifest and creates the API partition.
    ///
    /// All manifest resources are fetched before anything is written, so a
    /// failed install leaves the static partition untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`] if any resource fails to fetch or answers
    /// with a non-2xx status; the worker becomes [`WorkerState::Redundant`].
    pub async fn install(&self) -> Result<InstallReport> {
        self.transition("install", &[WorkerState::Parsed], WorkerState::Installing)?;
        log::info!("Installing worker {}", self.config.version);

        match self.precache().await {
            Ok(cached) => {
                self.set(WorkerState::Installed);
                log::info!("Installed worker {} ({cached} resources cached)", self.config.version);
                Ok(InstallReport {
                    cached,
                    skip_waiting: true,
                })
            }
            Err(e) => {
                self.set(WorkerState::Redundant);
                log::error!("Install of worker {} failed: {e}", self.config.version);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize> {
        let requests = self
            .config
            .static_manifest
            .iter()
            .map(|path| {
                self.config
                    .resolve(path)
                    .map(|url| Request::for_url(reqwest::Method::GET, url))
            })
            .collect::<Result<Vec<_>>>()?;

        let fetched = try_join_all(requests.iter().map(|request| async move {
            let response = self.network.fetch(request).await.map_err(|e| Error::Install {
                resource: request.url.to_string(),
                reason: e.to_string(),
            })?;
            if !response.is_ok() {
                return Err(Error::Install {
                    resource: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok((request.key(), response))
        }))
        .await?;

        let cached = fetched.len();
        for (key, response) in fetched {
            self.caches
                .put(&self.config.static_cache_name(), key, response)
                .await?;
        }
        self.caches.open(&self.config.static_cache_name()).await?;
        self.caches.open(&self.config.api_cache_name()).await?;
        Ok(cached)
    }

    /// Purges partitions from other versions and claims open pages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] if the worker is not installed, or a
    /// storage error if the partitions cannot be listed or deleted.
    pub async fn activate(&self) -> Result<ActivateReport> {
        self.transition("activate", &[WorkerState::Installed], WorkerState::Activating)?;
        log::info!("Activating worker {}", self.config.version);

        let mut report = ActivateReport::default();
        for name in self.caches.keys().await? {
            if self.config.is_current_cache(&name) {
                continue;
            }
            log::info!("Deleting old cache {name}");
            if self.caches.delete(&name).await? {
                report.deleted.push(name);
            }
        }

        report.claimed = self.clients.claim().await?;
        self.set(WorkerState::Activated);
        log::info!(
            "Activated worker {} (claimed {} clients)",
            self.config.version,
            report.claimed
        );
        Ok(report)
    }

    fn transition(&self, event: &'static str, from: &[WorkerState], to: WorkerState) -> Result<()> {
        let mut state = self.lock();
        if !from.contains(&*state) {
            return Err(Error::Lifecycle {
                event,
                state: state.to_string(),
            });
        }
        *state = to;
        Ok(())
    }

    fn set(&self, to: WorkerState) {
        *self.lock() = to;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorkerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
