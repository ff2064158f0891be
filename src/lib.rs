//! soulfriend-pwa - the offline layer of the SOULFRIEND assessment app.
//!
//! The crate has two halves:
//!
//! - a worker ([`ServiceWorker`]) that routes every page request through a
//!   cache-first or network-first strategy, versions its caches, replays
//!   assessment submissions made while offline and surfaces push
//!   notifications;
//! - a page-side controller ([`controller::PwaController`]) that turns page
//!   events into UI actions for the install banner, the offline indicator,
//!   the mobile navigation bar, pull-to-refresh and update notices.
//!
//! Platform access goes through capability traits ([`CacheStorage`],
//! [`Network`], [`SubmissionQueue`], [`Clients`], [`Notifier`]) so the worker
//! runs the same against in-memory fakes, the disk, or a live origin.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use soulfriend_pwa::{
//!     Capabilities, ClientRegistry, HttpNetwork, MemoryCacheStorage, MemorySubmissionQueue,
//!     NotificationCenter, Request, ServiceWorker, WorkerConfig,
//! };
//!
//! # async fn example() -> soulfriend_pwa::Result<()> {
//! let worker = ServiceWorker::new(
//!     WorkerConfig::default(),
//!     Capabilities {
//!         caches: Arc::new(MemoryCacheStorage::new()),
//!         network: Arc::new(HttpNetwork::new()?),
//!         queue: Arc::new(MemorySubmissionQueue::new()),
//!         clients: Arc::new(ClientRegistry::new()),
//!         notifier: Arc::new(NotificationCenter::new()),
//!     },
//! );
//! worker.install().await?;
//! worker.activate().await?;
//!
//! let page = Request::navigate("http://localhost:8501/")?;
//! if let Some(response) = worker.fetch(&page).await? {
//!     println!("{} {}", response.status, response.status_text);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod clients;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod manifest;
pub mod network;
pub mod push;
pub mod queue;
pub mod router;
#[cfg(feature = "server")]
pub mod server;
pub mod sync;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use cache::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use clients::{ClientRegistry, Clients, WindowClient};
pub use config::{AppConfig, ClientConfig, ServerConfig, WorkerConfig};
pub use error::{Error, Result};
pub use http::{Request, RequestKey, RequestMode, Response};
pub use lifecycle::{Lifecycle, WorkerState};
pub use manifest::WebAppManifest;
pub use network::{HttpNetwork, Network};
pub use push::{Notification, NotificationCenter, Notifier, PushPayload};
pub use queue::{FileSubmissionQueue, MemorySubmissionQueue, PendingSubmission, SubmissionQueue};
pub use router::{FetchRouter, Route};
pub use sync::{SyncManager, SyncReport};
pub use worker::{Capabilities, ServiceWorker, WorkerEvent, WorkerOutcome};
