//! Page-side PWA controller.
//!
//! The controller is a pure state machine: the presentation layer feeds it
//! [`ClientEvent`]s and renders the [`UiAction`]s it returns. Nothing here
//! touches a document or a timer; delays are carried in the actions.

mod connectivity;
mod gesture;
mod install;
mod nav;
mod update;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use connectivity::Connectivity;
pub use gesture::{PullToRefresh, is_pull};
pub use install::{InstallHandle, InstallOutcome, InstallPrompt};
pub use nav::{MobileNav, NavItem};
pub use update::UpdateWatcher;

use crate::config::ClientConfig;
use crate::lifecycle::WorkerState;

/// What the page looked like when the controller started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEnvironment {
    pub online: bool,
    /// The platform supports background sync registration.
    pub sync_supported: bool,
    pub has_viewport_meta: bool,
    pub has_mobile_nav: bool,
    /// A worker already controls the page.
    pub has_controller: bool,
}

impl Default for PageEnvironment {
    fn default() -> Self {
        Self {
            online: true,
            sync_supported: true,
            has_viewport_meta: false,
            has_mobile_nav: false,
            has_controller: false,
        }
    }
}

/// Input to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Worker registration succeeded.
    Registered,
    /// Worker registration failed; the page continues without offline support.
    RegistrationFailed(String),
    /// The platform offered a deferred install prompt.
    BeforeInstallPrompt(InstallHandle),
    /// The user pressed the install button on the banner.
    Install,
    /// The platform install dialog closed.
    InstallChoice(InstallOutcome),
    /// The user pressed the dismiss button on the banner.
    Dismiss,
    /// The app was installed.
    AppInstalled,
    Online,
    Offline,
    NavSelected(String),
    TouchStart { x: f64, y: f64 },
    TouchEnd { x: f64, y: f64, scroll_y: f64 },
    /// A new worker started installing.
    UpdateFound { worker: u64 },
    WorkerStateChanged { worker: u64, state: WorkerState },
    /// A worker took control of the page.
    ControllerChanged,
    /// The user accepted the update notification.
    ApplyUpdate,
}

/// Output of the controller, for the presentation layer to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    ShowInstallBanner { delay: Duration },
    HideInstallBanner,
    /// Show the platform install dialog for this handle.
    PromptInstall(InstallHandle),
    /// Persist the dismissal time under `pwa-install-dismissed`.
    RememberDismissal(DateTime<Utc>),
    ShowOfflineIndicator,
    HideOfflineIndicator,
    RegisterSync(String),
    InjectViewportMeta(String),
    InjectStylesheet(String),
    InjectMobileNav(Vec<NavItem>),
    SetActiveNav(String),
    Reload,
    ShowUpdateNotification { delay: Duration },
}

/// Storage key the dismissal timestamp is remembered under.
pub const DISMISSED_KEY: &str = "pwa-install-dismissed";

/// The page-side controller for one page load.
#[derive(Debug, Clone)]
pub struct PwaController {
    config: ClientConfig,
    env: PageEnvironment,
    install: InstallPrompt,
    connectivity: Connectivity,
    nav: MobileNav,
    gesture: PullToRefresh,
    update: UpdateWatcher,
}

impl PwaController {
    #[must_use]
    pub fn new(config: ClientConfig, env: PageEnvironment) -> Self {
        Self {
            install: InstallPrompt::new(),
            connectivity: Connectivity::new(env.online, env.sync_supported, config.sync_tag.clone()),
            nav: MobileNav::new(&config.nav_pages),
            gesture: PullToRefresh::new(config.pull_threshold, config.pull_max_drift),
            update: UpdateWatcher::new(env.has_controller),
            config,
            env,
        }
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    #[must_use]
    pub const fn install_prompt(&self) -> &InstallPrompt {
        &self.install
    }

    #[must_use]
    pub fn active_page(&self) -> Option<&str> {
        self.nav.active()
    }

    /// Actions to run once at page load: mobile affordances and the initial
    /// offline indicator.
    #[must_use]
    pub fn start(&self) -> Vec<UiAction> {
        let mut actions = Vec::new();
        if !self.env.has_viewport_meta {
            actions.push(UiAction::InjectViewportMeta(self.config.viewport.clone()));
        }
        actions.push(UiAction::InjectStylesheet(self.config.mobile_stylesheet.clone()));
        if !self.env.has_mobile_nav {
            actions.push(UiAction::InjectMobileNav(self.nav.items().to_vec()));
        }
        actions.extend(self.connectivity.initial());
        actions
    }

    /// Applies one event and returns the actions it triggers.
    pub fn handle(&mut self, event: ClientEvent) -> Vec<UiAction> {
        match event {
            ClientEvent::Registered => {
                log::info!("Worker registered");
                Vec::new()
            }
            ClientEvent::RegistrationFailed(reason) => {
                log::error!("Worker registration failed: {reason}");
                Vec::new()
            }
            ClientEvent::BeforeInstallPrompt(handle) => {
                if self.install.capture(handle) {
                    vec![UiAction::ShowInstallBanner {
                        delay: Duration::from_millis(self.config.install_banner_delay_ms),
                    }]
                } else {
                    Vec::new()
                }
            }
            ClientEvent::Install => self
                .install
                .install()
                .map(UiAction::PromptInstall)
                .into_iter()
                .collect(),
            ClientEvent::InstallChoice(outcome) => {
                if self.install.choice(outcome) {
                    vec![UiAction::HideInstallBanner]
                } else {
                    Vec::new()
                }
            }
            ClientEvent::Dismiss => {
                let at = self.install.dismiss(Utc::now());
                vec![UiAction::HideInstallBanner, UiAction::RememberDismissal(at)]
            }
            ClientEvent::AppInstalled => {
                log::info!("App installed");
                self.install.installed();
                vec![UiAction::HideInstallBanner]
            }
            ClientEvent::Online => self.connectivity.set_online(true),
            ClientEvent::Offline => self.connectivity.set_online(false),
            ClientEvent::NavSelected(page) => {
                if self.nav.select(&page) {
                    vec![UiAction::SetActiveNav(page)]
                } else {
                    Vec::new()
                }
            }
            ClientEvent::TouchStart { x, y } => {
                self.gesture.touch_start(x, y);
                Vec::new()
            }
            ClientEvent::TouchEnd { x, y, scroll_y } => {
                if self.gesture.touch_end(x, y, scroll_y) {
                    log::info!("Pull to refresh triggered");
                    vec![UiAction::Reload]
                } else {
                    Vec::new()
                }
            }
            ClientEvent::UpdateFound { worker } => {
                self.update.update_found(worker);
                Vec::new()
            }
            ClientEvent::WorkerStateChanged { worker, state } => {
                if self.update.state_changed(worker, state) {
                    vec![UiAction::ShowUpdateNotification {
                        delay: Duration::from_millis(self.config.update_banner_delay_ms),
                    }]
                } else {
                    Vec::new()
                }
            }
            ClientEvent::ControllerChanged => {
                self.update.set_controller(true);
                Vec::new()
            }
            ClientEvent::ApplyUpdate => vec![UiAction::Reload],
        }
    }
}
