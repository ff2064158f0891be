//! Push payloads, notifications and notification clicks.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clients::Clients;
use crate::config::{NotificationDefaults, WorkerConfig};
use crate::error::Result;

/// A button offered on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Incoming push payload. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub require_interaction: Option<bool>,
    #[serde(default)]
    pub actions: Option<Vec<NotificationAction>>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// A notification ready to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: serde_json::Value,
}

impl Notification {
    /// Fills absent or empty payload fields from `defaults`.
    #[must_use]
    pub fn from_payload(payload: PushPayload, defaults: &NotificationDefaults) -> Self {
        let or_default = |value: Option<String>, default: &String| {
            value.filter(|s| !s.is_empty()).unwrap_or_else(|| default.clone())
        };
        Self {
            title: or_default(payload.title, &defaults.title),
            body: or_default(payload.body, &defaults.body),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            tag: or_default(payload.tag, &defaults.tag),
            require_interaction: payload.require_interaction.unwrap_or(false),
            actions: payload.actions.unwrap_or_default(),
            data: payload
                .data
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
        }
    }

    /// The page a click should lead to: `data.url`, or the app root.
    #[must_use]
    pub fn target_url(&self) -> &str {
        self.data
            .get("url")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("/")
    }
}

/// Displays and dismisses system notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<()>;

    /// Closes every shown notification carrying `tag`.
    async fn close(&self, tag: &str) -> Result<()>;
}

/// Notifier that logs and keeps the currently shown notifications.
///
/// A notification with the same tag as a shown one replaces it.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently on screen.
    #[must_use]
    pub fn shown(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for NotificationCenter {
    async fn show(&self, notification: &Notification) -> Result<()> {
        log::info!("Notification [{}] {}: {}", notification.tag, notification.title, notification.body);
        let mut shown = self.lock();
        shown.retain(|n| n.tag != notification.tag);
        shown.push(notification.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<()> {
        self.lock().retain(|n| n.tag != tag);
        Ok(())
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An open page already showed the target and was focused.
    Focused { client_id: String },
    /// A new page was opened.
    Opened { client_id: String },
    /// No page matched and the platform cannot open windows.
    Ignored,
}

/// Handles push and notification-click events.
pub struct PushHandler {
    config: Arc<WorkerConfig>,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
}

impl PushHandler {
    #[must_use]
    pub fn new(
        config: Arc<WorkerConfig>,
        notifier: Arc<dyn Notifier>,
        clients: Arc<dyn Clients>,
    ) -> Self {
        Self {
            config,
            notifier,
            clients,
        }
    }

    /// Shows a notification for a push message. A push without data shows
    /// nothing and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object of the expected
    /// shape or the notifier fails.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> Result<Option<Notification>> {
        log::info!("Push notification received");
        let Some(data) = data else {
            return Ok(None);
        };
        let payload: PushPayload = serde_json::from_slice(data)?;
        let notification = Notification::from_payload(payload, &self.config.notification);
        self.notifier.show(&notification).await?;
        Ok(Some(notification))
    }

    /// Closes the notification, then focuses the first page already at the
    /// target URL or opens a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the notifier or the client registry fails.
    pub async fn handle_click(&self, notification: &Notification) -> Result<ClickOutcome> {
        log::info!("Notification clicked: {}", notification.tag);
        self.notifier.close(&notification.tag).await?;

        // Compare absolute URLs; a relative target would never equal a page URL
        let target = self
            .config
            .resolve(notification.target_url())
            .map_or_else(|_| notification.target_url().to_string(), |u| u.to_string());

        for client in self.clients.match_all().await? {
            if client.url == target && self.clients.focus(&client.id).await? {
                return Ok(ClickOutcome::Focused {
                    client_id: client.id,
                });
            }
        }

        Ok(match self.clients.open_window(&target).await? {
            Some(client) => ClickOutcome::Opened {
                client_id: client.id,
            },
            None => ClickOutcome::Ignored,
        })
    }
}
