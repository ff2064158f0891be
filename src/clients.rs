//! Window clients the worker can claim, focus or open.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;

/// An open page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
    pub focused: bool,
    /// Whether this worker controls the page.
    pub controlled: bool,
}

/// Capability over the pages this worker can see.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Lists open windows, oldest first.
    async fn match_all(&self) -> Result<Vec<WindowClient>>;

    /// Focuses a window. Returns false if it no longer exists.
    async fn focus(&self, id: &str) -> Result<bool>;

    /// Opens a new window at `url`, if the platform allows it.
    async fn open_window(&self, url: &str) -> Result<Option<WindowClient>>;

    /// Takes control of every open window. Returns how many were claimed.
    async fn claim(&self) -> Result<usize>;
}

/// In-memory window registry.
///
/// The host records each navigation it proxies as a visit, which is the
/// closest thing to an open window it can observe.
#[derive(Debug)]
pub struct ClientRegistry {
    windows: Mutex<Vec<WindowClient>>,
    can_open: bool,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            windows: Mutex::new(Vec::new()),
            can_open: true,
        }
    }

    /// A registry whose platform cannot open windows.
    #[must_use]
    pub const fn without_open_window() -> Self {
        Self {
            windows: Mutex::new(Vec::new()),
            can_open: false,
        }
    }

    /// Records a page at `url`, returning its client id. Revisits reuse the id.
    pub fn visit(&self, url: &str) -> String {
        let mut windows = self.lock();
        if let Some(existing) = windows.iter().find(|w| w.url == url) {
            return existing.id.clone();
        }
        let client = WindowClient {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            focused: false,
            controlled: false,
        };
        let id = client.id.clone();
        windows.push(client);
        id
    }

    /// Forgets a page.
    pub fn close(&self, id: &str) -> bool {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|w| w.id != id);
        windows.len() != before
    }

    /// Snapshot of the registry.
    #[must_use]
    pub fn windows(&self) -> Vec<WindowClient> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<WindowClient>> {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Clients for ClientRegistry {
    async fn match_all(&self) -> Result<Vec<WindowClient>> {
        Ok(self.windows())
    }

    async fn focus(&self, id: &str) -> Result<bool> {
        let mut windows = self.lock();
        if !windows.iter().any(|w| w.id == id) {
            return Ok(false);
        }
        for window in windows.iter_mut() {
            window.focused = window.id == id;
        }
        Ok(true)
    }

    async fn open_window(&self, url: &str) -> Result<Option<WindowClient>> {
        if !self.can_open {
            return Ok(None);
        }
        log::info!("Opening window at {url}");
        let mut windows = self.lock();
        for window in windows.iter_mut() {
            window.focused = false;
        }
        let client = WindowClient {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            focused: true,
            controlled: true,
        };
        windows.push(client.clone());
        Ok(Some(client))
    }

    async fn claim(&self) -> Result<usize> {
        let mut windows = self.lock();
        for window in windows.iter_mut() {
            window.controlled = true;
        }
        Ok(windows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_reuses_ids_per_url() {
        let registry = ClientRegistry::new();
        let a = registry.visit("http://localhost/");
        let b = registry.visit("http://localhost/results");
        assert_ne!(a, b);
        assert_eq!(registry.visit("http://localhost/"), a);
        assert_eq!(registry.windows().len(), 2);

        assert!(registry.close(&a));
        assert!(!registry.close(&a));
        assert_eq!(registry.windows().len(), 1);
    }

    #[tokio::test]
    async fn focus_moves_between_windows() {
        let registry = ClientRegistry::new();
        let a = registry.visit("http://localhost/a");
        let b = registry.visit("http://localhost/b");

        assert!(registry.focus(&a).await.unwrap());
        assert!(registry.focus(&b).await.unwrap());
        let windows = registry.match_all().await.unwrap();
        assert!(!windows[0].focused);
        assert!(windows[1].focused);
        assert!(!registry.focus("gone").await.unwrap());
    }

    #[tokio::test]
    async fn claim_controls_every_window() {
        let registry = ClientRegistry::new();
        registry.visit("http://localhost/a");
        registry.visit("http://localhost/b");

        assert_eq!(registry.claim().await.unwrap(), 2);
        assert!(registry.windows().iter().all(|w| w.controlled));
    }

    #[tokio::test]
    async fn open_window_respects_platform_support() {
        let registry = ClientRegistry::new();
        let opened = registry.open_window("http://localhost/").await.unwrap().unwrap();
        assert!(opened.focused);

        let restricted = ClientRegistry::without_open_window();
        assert!(restricted.open_window("http://localhost/").await.unwrap().is_none());
        assert!(restricted.windows().is_empty());
    }
}
