//! Update-available detection.

use std::collections::HashSet;

use crate::lifecycle::WorkerState;

/// Watches installing workers and reports when a new version is waiting.
///
/// An update is only offered when a worker already controls the page; the
/// very first install is not an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateWatcher {
    has_controller: bool,
    tracking: HashSet<u64>,
    notified: HashSet<u64>,
}

impl UpdateWatcher {
    #[must_use]
    pub fn new(has_controller: bool) -> Self {
        Self {
            has_controller,
            ..Self::default()
        }
    }

    /// A worker now controls the page.
    pub const fn set_controller(&mut self, present: bool) {
        self.has_controller = present;
    }

    /// Starts watching a newly found installing worker.
    pub fn update_found(&mut self, worker: u64) {
        self.tracking.insert(worker);
    }

    /// Returns true the first time a tracked worker reaches `Installed`
    /// while a controller is present.
    pub fn state_changed(&mut self, worker: u64, state: WorkerState) -> bool {
        if state != WorkerState::Installed
            || !self.has_controller
            || !self.tracking.contains(&worker)
        {
            return false;
        }
        self.notified.insert(worker)
    }
}
