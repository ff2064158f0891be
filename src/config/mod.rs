//! Configuration for the worker, the client controller and the host server.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Application name used to stamp cache partition names.
pub const APP_NAME: &str = "soulfriend";

/// Default cache version.
pub const DEFAULT_VERSION: &str = "v2.0";

/// Offline notice shown by synthesized API responses and the offline banner.
pub const OFFLINE_MESSAGE: &str = "Bạn đang offline. Một số tính năng có thể không khả dụng.";

/// Fallback document returned for navigations when no offline page is cached.
pub const OFFLINE_HTML: &str =
    "<h1>Offline</h1><p>Bạn đang offline. Vui lòng kiểm tra kết nối mạng.</p>";

/// Defaults applied to push notifications when the payload omits a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub icon: String,
    pub badge: String,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "SOULFRIEND".to_string(),
            body: "SOULFRIEND notification".to_string(),
            tag: "soulfriend-notification".to_string(),
            icon: "/static/icon-192.png".to_string(),
            badge: "/static/icon-96.png".to_string(),
        }
    }
}

/// Startup configuration injected into the worker.
///
/// Partition names are derived from [`version`](Self::version) unless set
/// explicitly, so bumping the version renames both partitions and the next
/// activation purges the old ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache version stamp.
    pub version: String,
    /// Explicit name of the static asset partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_cache_name: Option<String>,
    /// Explicit name of the API response partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_cache_name: Option<String>,
    /// Resources pre-cached on install, as origin-relative paths.
    pub static_manifest: Vec<String>,
    /// Path prefixes routed network-first.
    pub api_prefixes: Vec<String>,
    /// Origin the relative paths above resolve against.
    pub origin: String,
    /// Cached page served to offline navigations, if present in any partition.
    pub offline_page: String,
    /// Localized offline notice for synthesized API responses.
    pub offline_message: String,
    /// Fallback navigation document when `offline_page` is not cached.
    pub offline_html: String,
    /// Background sync tag that triggers submission replay.
    pub sync_tag: String,
    /// Endpoint pending submissions are POSTed to.
    pub submission_endpoint: String,
    /// Push notification defaults.
    pub notification: NotificationDefaults,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            static_cache_name: None,
            api_cache_name: None,
            static_manifest: vec![
                "/".to_string(),
                "/static/manifest.json".to_string(),
                "/static/icon-192.png".to_string(),
                "/static/icon-512.png".to_string(),
            ],
            api_prefixes: vec!["/api/".to_string()],
            origin: "http://localhost:8501".to_string(),
            offline_page: "/offline.html".to_string(),
            offline_message: OFFLINE_MESSAGE.to_string(),
            offline_html: OFFLINE_HTML.to_string(),
            sync_tag: "assessment-submission".to_string(),
            submission_endpoint: "/api/assessments".to_string(),
            notification: NotificationDefaults::default(),
        }
    }
}

impl WorkerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the version the partition names are stamped with.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Sets explicit partition names, leaving the version untouched.
    #[must_use]
    pub fn with_cache_names(mut self, static_name: &str, api_name: &str) -> Self {
        self.static_cache_name = Some(static_name.to_string());
        self.api_cache_name = Some(api_name.to_string());
        self
    }

    /// Name of the static asset partition.
    #[must_use]
    pub fn static_cache_name(&self) -> String {
        self.static_cache_name
            .clone()
            .unwrap_or_else(|| format!("{APP_NAME}-{}", self.version))
    }

    /// Name of the API response partition.
    #[must_use]
    pub fn api_cache_name(&self) -> String {
        self.api_cache_name
            .clone()
            .unwrap_or_else(|| format!("{APP_NAME}-api-{}", self.version))
    }

    /// Sets the pre-cache manifest.
    #[must_use]
    pub fn with_static_manifest<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_manifest = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the network-first path prefixes.
    #[must_use]
    pub fn with_api_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the origin relative paths resolve against.
    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    /// Returns true if `path` falls under any API prefix.
    #[must_use]
    pub fn is_api_path(&self, path: &str) -> bool {
        self.api_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Returns true if `name` is one of the two current partitions.
    #[must_use]
    pub fn is_current_cache(&self, name: &str) -> bool {
        name == self.static_cache_name() || name == self.api_cache_name()
    }

    /// Resolves an origin-relative path (or same-origin URL) to a full URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the origin or the joined URL is
    /// invalid, or if `path` points at another origin.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        let invalid = |reason: String| Error::InvalidUrl {
            url: format!("{}{path}", self.origin),
            reason,
        };
        let base = Url::parse(&self.origin).map_err(|e| invalid(e.to_string()))?;
        let url = base.join(path).map_err(|e| invalid(e.to_string()))?;
        if url.origin() != base.origin() {
            return Err(invalid(format!("leaves origin {}", self.origin)));
        }
        Ok(url)
    }

    /// Builds a URL on the origin from a request path and optional query.
    ///
    /// Unlike [`resolve`](Self::resolve) the path is never parsed as a
    /// reference, so `//host/x` stays on the origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the origin is invalid.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.origin).map_err(|e| Error::InvalidUrl {
            url: self.origin.clone(),
            reason: e.to_string(),
        })?;
        url.set_path(path);
        url.set_query(query);
        Ok(url)
    }
}

/// Configuration for the page-side controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Delay before the install banner slides in, in milliseconds.
    pub install_banner_delay_ms: u64,
    /// Delay before the update notification slides in, in milliseconds.
    pub update_banner_delay_ms: u64,
    /// Sync tag registered when connectivity returns.
    pub sync_tag: String,
    /// Stylesheet injected for mobile layouts.
    pub mobile_stylesheet: String,
    /// Viewport meta content injected when the page lacks one.
    pub viewport: String,
    /// Downward travel, in pixels, that counts as a pull.
    pub pull_threshold: f64,
    /// Maximum sideways drift, in pixels, for a pull.
    pub pull_max_drift: f64,
    /// Pages offered in the mobile navigation bar.
    pub nav_pages: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            install_banner_delay_ms: 2000,
            update_banner_delay_ms: 100,
            sync_tag: "assessment-submission".to_string(),
            mobile_stylesheet: "/static/mobile.css".to_string(),
            viewport: "width=device-width, initial-scale=1.0, user-scalable=no".to_string(),
            pull_threshold: 100.0,
            pull_max_drift: 50.0,
            nav_pages: vec![
                "assessment".to_string(),
                "results".to_string(),
                "resources".to_string(),
            ],
        }
    }
}

/// Host server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Seconds between connectivity probes of the origin.
    pub probe_interval_secs: u64,
    /// Origin-relative path probed for connectivity.
    pub probe_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8502,
            probe_interval_secs: 15,
            probe_path: "/".to_string(),
        }
    }
}

/// Where persistent state lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root of the on-disk cache partitions.
    pub cache_dir: PathBuf,
    /// Pending submission queue file.
    pub queue_file: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let state_dir = state_dir();
        Self {
            cache_dir: state_dir.join("caches"),
            queue_file: state_dir.join("pending-submissions.toml"),
        }
    }
}

/// Returns the directory for persistent worker state.
///
/// Uses `STATE_DIRECTORY` (set by systemd when `StateDirectory=` is configured),
/// falling back to `$XDG_DATA_HOME/soulfriend-pwa` for interactive use.
#[must_use]
pub fn state_dir() -> PathBuf {
    std::env::var("STATE_DIRECTORY").map_or_else(
        |_| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("soulfriend-pwa")
        },
        PathBuf::from,
    )
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub worker: WorkerConfig,
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("soulfriend-pwa")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the sections agree with each other.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client registers a sync tag the
    /// worker does not answer to.
    pub fn validate(&self) -> Result<()> {
        if self.client.sync_tag != self.worker.sync_tag {
            return Err(Error::Config(format!(
                "client sync_tag '{}' does not match worker sync_tag '{}'",
                self.client.sync_tag, self.worker.sync_tag
            )));
        }
        Ok(())
    }

    /// Saves configuration atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, toml_str)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Loads the config at `path`, writing a default template first if it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be written or the file is invalid.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Writing default config to {}", path.display());
            Self::default().save(path)?;
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.static_cache_name(), "soulfriend-v2.0");
        assert_eq!(config.api_cache_name(), "soulfriend-api-v2.0");
        assert_eq!(config.api_prefixes, vec!["/api/"]);
        assert_eq!(config.static_manifest.len(), 4);
        assert_eq!(config.sync_tag, "assessment-submission");
    }

    #[test]
    fn worker_config_builder_pattern() {
        let config = WorkerConfig::new()
            .with_version("v3.1")
            .with_static_manifest(["/", "/offline.html"])
            .with_api_prefixes(["/api/", "/graphql"])
            .with_origin("https://soulfriend.example/");

        assert_eq!(config.static_cache_name(), "soulfriend-v3.1");
        assert_eq!(config.api_cache_name(), "soulfriend-api-v3.1");
        assert_eq!(config.static_manifest, vec!["/", "/offline.html"]);
        assert!(config.is_api_path("/graphql/query"));
        assert_eq!(config.origin, "https://soulfriend.example");
    }

    #[test]
    fn api_path_matching_is_prefix_based() {
        let config = WorkerConfig::default();
        assert!(config.is_api_path("/api/questionnaires"));
        assert!(!config.is_api_path("/apidocs"));
        assert!(!config.is_api_path("/static/api/x.js"));
    }

    #[test]
    fn current_cache_names() {
        let config = WorkerConfig::new().with_cache_names("v-new-static", "v-new-api");
        assert!(config.is_current_cache("v-new-static"));
        assert!(config.is_current_cache("v-new-api"));
        assert!(!config.is_current_cache("v-old-static"));
        assert!(!config.is_current_cache("soulfriend-v2.0"));
    }

    #[test]
    fn explicit_cache_names_survive_a_version_bump() {
        let config = WorkerConfig::new()
            .with_cache_names("pinned-static", "pinned-api")
            .with_version("v4");
        assert_eq!(config.static_cache_name(), "pinned-static");
        assert_eq!(config.api_cache_name(), "pinned-api");
    }

    #[test]
    fn resolve_joins_against_origin() {
        let config = WorkerConfig::default();
        assert_eq!(
            config.resolve("/offline.html").unwrap().as_str(),
            "http://localhost:8501/offline.html"
        );
        let bad = WorkerConfig::new().with_origin("not a url");
        assert!(bad.resolve("/").is_err());
    }

    #[test]
    fn resolve_refuses_other_origins() {
        let config = WorkerConfig::default();
        for path in ["//evil.example/steal", "http://evil.example/", "https://localhost:8501/"] {
            assert!(
                matches!(config.resolve(path), Err(Error::InvalidUrl { .. })),
                "{path} should not resolve"
            );
        }
        assert_eq!(
            config.resolve("http://localhost:8501/x").unwrap().as_str(),
            "http://localhost:8501/x"
        );
    }

    #[test]
    fn url_for_keeps_scheme_relative_paths_on_origin() {
        let config = WorkerConfig::default();
        let url = config.url_for("//evil.example/steal", Some("a=1")).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(8501));
        assert_eq!(url.path(), "//evil.example/steal");
        assert_eq!(url.query(), Some("a=1"));
    }

    #[test]
    fn default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.install_banner_delay_ms, 2000);
        assert_eq!(config.nav_pages, vec!["assessment", "results", "resources"]);
        assert!((config.pull_threshold - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8502);
    }

    #[test]
    fn app_config_serializes_to_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn partial_toml_takes_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [worker]
            version = "v9"
            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.worker.version, "v9");
        assert_eq!(config.worker.static_cache_name(), "soulfriend-v9");
        assert_eq!(config.worker.api_cache_name(), "soulfriend-api-v9");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn load_or_create_writes_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = AppConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, AppConfig::default());

        let mut changed = created;
        changed.server.port = 9100;
        changed.save(&path).unwrap();
        assert_eq!(AppConfig::load_or_create(&path).unwrap().server.port, 9100);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[worker\nversion = ").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn load_rejects_mismatched_sync_tags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\nsync_tag = \"other-tag\"\n").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("other-tag")));
        assert!(AppConfig::default().validate().is_ok());
    }
}
