//! The worker facade: one version of the offline layer with its capabilities.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::CacheStorage;
use crate::clients::Clients;
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::http::{Request, Response};
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle, WorkerState};
use crate::network::Network;
use crate::push::{ClickOutcome, Notification, Notifier, PushHandler};
use crate::queue::SubmissionQueue;
use crate::router::FetchRouter;
use crate::sync::{SyncManager, SyncReport};

/// Platform capabilities the worker runs against.
#[derive(Clone)]
pub struct Capabilities {
    pub caches: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub queue: Arc<dyn SubmissionQueue>,
    pub clients: Arc<dyn Clients>,
    pub notifier: Arc<dyn Notifier>,
}

/// Events the platform delivers to a worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Sync(String),
    Push(Option<Bytes>),
    NotificationClick(Notification),
}

/// Result of dispatching a [`WorkerEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    /// `None` when the request was not intercepted.
    Fetched(Option<Response>),
    /// `None` when the sync tag was not ours.
    Synced(Option<SyncReport>),
    /// `None` when the push carried no data.
    Pushed(Option<Notification>),
    Clicked(ClickOutcome),
}

/// A worker version wired to its capabilities.
pub struct ServiceWorker {
    config: Arc<WorkerConfig>,
    network: Arc<dyn Network>,
    lifecycle: Lifecycle,
    router: FetchRouter,
    sync: Arc<SyncManager>,
    push: PushHandler,
}

impl ServiceWorker {
    #[must_use]
    pub fn new(config: WorkerConfig, capabilities: Capabilities) -> Self {
        let config = Arc::new(config);
        let Capabilities {
            caches,
            network,
            queue,
            clients,
            notifier,
        } = capabilities;

        let lifecycle = Lifecycle::new(
            config.clone(),
            caches.clone(),
            network.clone(),
            clients.clone(),
        );
        let router = FetchRouter::new(config.clone(), caches, network.clone())
            .with_queue(queue.clone());
        let sync = Arc::new(SyncManager::new(config.clone(), network.clone(), queue));
        let push = PushHandler::new(config.clone(), notifier, clients);

        Self {
            config,
            network,
            lifecycle,
            router,
            sync,
            push,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// The network capability, for requests the worker does not intercept.
    #[must_use]
    pub fn network(&self) -> Arc<dyn Network> {
        self.network.clone()
    }

    /// Shared handle to the sync manager, for the background sync loop.
    #[must_use]
    pub fn sync_manager(&self) -> Arc<SyncManager> {
        self.sync.clone()
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    /// # Errors
    ///
    /// See [`Lifecycle::install`].
    pub async fn install(&self) -> Result<InstallReport> {
        self.lifecycle.install().await
    }

    /// # Errors
    ///
    /// See [`Lifecycle::activate`].
    pub async fn activate(&self) -> Result<ActivateReport> {
        self.lifecycle.activate().await
    }

    /// Routes an intercepted request. `None` means the caller should send it
    /// to the network itself.
    ///
    /// # Errors
    ///
    /// See [`FetchRouter::handle`].
    pub async fn fetch(&self, request: &Request) -> Result<Option<Response>> {
        self.router.handle(request).await
    }

    /// # Errors
    ///
    /// See [`SyncManager::handle_sync`].
    pub async fn sync(&self, tag: &str) -> Result<Option<SyncReport>> {
        self.sync.handle_sync(tag).await
    }

    /// # Errors
    ///
    /// See [`PushHandler::handle_push`].
    pub async fn push(&self, data: Option<&[u8]>) -> Result<Option<Notification>> {
        self.push.handle_push(data).await
    }

    /// # Errors
    ///
    /// See [`PushHandler::handle_click`].
    pub async fn notification_click(&self, notification: &Notification) -> Result<ClickOutcome> {
        self.push.handle_click(notification).await
    }

    /// Handles one platform event.
    ///
    /// # Errors
    ///
    /// Returns whatever the handler for the event returns.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<WorkerOutcome> {
        Ok(match event {
            WorkerEvent::Install => WorkerOutcome::Installed(self.install().await?),
            WorkerEvent::Activate => WorkerOutcome::Activated(self.activate().await?),
            WorkerEvent::Fetch(request) => WorkerOutcome::Fetched(self.fetch(&request).await?),
            WorkerEvent::Sync(tag) => WorkerOutcome::Synced(self.sync(&tag).await?),
            WorkerEvent::Push(data) => WorkerOutcome::Pushed(self.push(data.as_deref()).await?),
            WorkerEvent::NotificationClick(notification) => {
                WorkerOutcome::Clicked(self.notification_click(&notification).await?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::clients::ClientRegistry;
    use crate::push::NotificationCenter;
    use crate::queue::MemorySubmissionQueue;
    use crate::testing::MockNetwork;
    use serde_json::json;

    const ORIGIN: &str = "http://localhost:8501";

    struct Harness {
        worker: ServiceWorker,
        network: Arc<MockNetwork>,
        caches: Arc<MemoryCacheStorage>,
        queue: Arc<MemorySubmissionQueue>,
        clients: Arc<ClientRegistry>,
        notifier: Arc<NotificationCenter>,
    }

    fn harness() -> Harness {
        let network = Arc::new(MockNetwork::online());
        for path in ["/", "/static/manifest.json", "/static/icon-192.png", "/static/icon-512.png"] {
            network.respond(&format!("{ORIGIN}{path}"), Response::new(200, path.to_string()));
        }
        let caches = Arc::new(MemoryCacheStorage::new());
        let queue = Arc::new(MemorySubmissionQueue::new());
        let clients = Arc::new(ClientRegistry::new());
        let notifier = Arc::new(NotificationCenter::new());
        let worker = ServiceWorker::new(
            WorkerConfig::new().with_origin(ORIGIN),
            Capabilities {
                caches: caches.clone(),
                network: network.clone(),
                queue: queue.clone(),
                clients: clients.clone(),
                notifier: notifier.clone(),
            },
        );
        Harness {
            worker,
            network,
            caches,
            queue,
            clients,
            notifier,
        }
    }

    #[tokio::test]
    async fn full_lifecycle_through_dispatch() {
        let h = harness();
        h.caches.open("soulfriend-v1.0").await.unwrap();
        h.clients.visit("http://localhost:8501/");

        let installed = h.worker.dispatch(WorkerEvent::Install).await.unwrap();
        assert!(matches!(installed, WorkerOutcome::Installed(InstallReport { cached: 4, .. })));

        let WorkerOutcome::Activated(report) = h.worker.dispatch(WorkerEvent::Activate).await.unwrap()
        else {
            panic!("expected activation");
        };
        assert_eq!(report.deleted, vec!["soulfriend-v1.0"]);
        assert_eq!(report.claimed, 1);
        assert_eq!(h.worker.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn offline_submission_is_replayed_after_reconnect() {
        let h = harness();
        h.network.set_offline(true);
        let data = json!({"questionnaire": "dass21", "answers": [0, 1, 3]});
        let submit = Request::post_json(&format!("{ORIGIN}/api/assessments"), &data).unwrap();

        let outcome = h.worker.dispatch(WorkerEvent::Fetch(submit)).await.unwrap();
        let WorkerOutcome::Fetched(Some(response)) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(response.status, 503);
        assert_eq!(h.queue.pending().await.unwrap().len(), 1);

        h.network.set_offline(false);
        h.network
            .respond(&format!("{ORIGIN}/api/assessments"), Response::json(201, &json!({})));
        let synced = h
            .worker
            .dispatch(WorkerEvent::Sync("assessment-submission".to_string()))
            .await
            .unwrap();
        assert_eq!(
            synced,
            WorkerOutcome::Synced(Some(SyncReport { attempted: 1, synced: 1, failed: 0 }))
        );
        assert!(h.queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn passthrough_fetch_is_not_intercepted() {
        let h = harness();
        let request = Request::new(reqwest::Method::DELETE, &format!("{ORIGIN}/session")).unwrap();
        let outcome = h.worker.dispatch(WorkerEvent::Fetch(request)).await.unwrap();
        assert_eq!(outcome, WorkerOutcome::Fetched(None));
    }

    #[tokio::test]
    async fn push_then_click_opens_target() {
        let h = harness();
        let data = Bytes::from_static(br#"{"title":"SOULFRIEND","data":{"url":"/results"}}"#);
        let WorkerOutcome::Pushed(Some(notification)) =
            h.worker.dispatch(WorkerEvent::Push(Some(data))).await.unwrap()
        else {
            panic!("expected a notification");
        };
        assert_eq!(h.notifier.shown().len(), 1);

        let clicked = h
            .worker
            .dispatch(WorkerEvent::NotificationClick(notification))
            .await
            .unwrap();
        assert!(matches!(clicked, WorkerOutcome::Clicked(ClickOutcome::Opened { .. })));
        assert!(h.notifier.shown().is_empty());
        assert_eq!(h.clients.windows()[0].url, "http://localhost:8501/results");
    }

    #[tokio::test]
    async fn empty_push_shows_nothing() {
        let h = harness();
        let outcome = h.worker.dispatch(WorkerEvent::Push(None)).await.unwrap();
        assert_eq!(outcome, WorkerOutcome::Pushed(None));
    }
}
