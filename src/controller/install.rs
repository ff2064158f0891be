//! Deferred install prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle to a deferred platform install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallHandle(pub u64);

/// The user's answer to the platform install dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// Holds the install prompt for one page load.
///
/// A handle is captured at most once and consumed at most once; after
/// install, dismiss or an external install the prompt stays cleared.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallPrompt {
    deferred: Option<InstallHandle>,
    consumed: bool,
    awaiting_choice: bool,
}

impl InstallPrompt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently held handle.
    #[must_use]
    pub const fn handle(&self) -> Option<InstallHandle> {
        self.deferred
    }

    /// True while the platform dialog is open.
    #[must_use]
    pub const fn awaiting_choice(&self) -> bool {
        self.awaiting_choice
    }

    /// Stores a deferred prompt. Returns false if one is already held or the
    /// prompt was consumed earlier in this page load.
    pub fn capture(&mut self, handle: InstallHandle) -> bool {
        if self.deferred.is_some() || self.consumed {
            return false;
        }
        self.deferred = Some(handle);
        true
    }

    /// Takes the handle to show the platform dialog. Without a handle this is
    /// a no-op returning `None`.
    pub fn install(&mut self) -> Option<InstallHandle> {
        let handle = self.deferred.take()?;
        self.consumed = true;
        self.awaiting_choice = true;
        Some(handle)
    }

    /// Records the dialog result. Returns false if no dialog was open.
    pub fn choice(&mut self, outcome: InstallOutcome) -> bool {
        if !self.awaiting_choice {
            return false;
        }
        self.awaiting_choice = false;
        log::info!("Install prompt outcome: {outcome:?}");
        true
    }

    /// Drops the prompt and returns the dismissal time to remember.
    pub fn dismiss(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.clear();
        now
    }

    /// The app was installed by other means.
    pub fn installed(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.deferred = None;
        self.consumed = true;
        self.awaiting_choice = false;
    }
}
