//! Online/offline indicator state.

use super::UiAction;

/// Tracks connectivity as reported by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connectivity {
    online: bool,
    sync_supported: bool,
    sync_tag: String,
}

impl Connectivity {
    #[must_use]
    pub fn new(online: bool, sync_supported: bool, sync_tag: impl Into<String>) -> Self {
        Self {
            online,
            sync_supported,
            sync_tag: sync_tag.into(),
        }
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.online
    }

    /// Actions for the state at page load.
    #[must_use]
    pub fn initial(&self) -> Vec<UiAction> {
        if self.online {
            Vec::new()
        } else {
            vec![UiAction::ShowOfflineIndicator]
        }
    }

    /// Applies a connectivity event. Repeating the current state does nothing.
    pub fn set_online(&mut self, online: bool) -> Vec<UiAction> {
        if self.online == online {
            return Vec::new();
        }
        self.online = online;
        if !online {
            return vec![UiAction::ShowOfflineIndicator];
        }

        let mut actions = vec![UiAction::HideOfflineIndicator];
        if self.sync_supported {
            actions.push(UiAction::RegisterSync(self.sync_tag.clone()));
        }
        actions
    }
}
