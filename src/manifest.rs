//! The SOULFRIEND web app manifest.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Icon sizes shipped under `/static/icon-<size>.png`.
pub const ICON_SIZES: [u32; 8] = [72, 96, 128, 144, 152, 192, 384, 512];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl ManifestIcon {
    /// A square PNG icon from the static directory.
    #[must_use]
    pub fn png(size: u32) -> Self {
        Self {
            src: format!("/static/icon-{size}.png"),
            sizes: format!("{size}x{size}"),
            mime_type: "image/png".to_string(),
            purpose: Some("any maskable".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub form_factor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<ManifestIcon>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedApplication {
    pub platform: String,
    pub url: String,
}

/// Installability metadata served at `/static/manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppManifest {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub version: String,
    pub start_url: String,
    pub display: String,
    pub orientation: String,
    pub theme_color: String,
    pub background_color: String,
    pub scope: String,
    pub lang: String,
    pub dir: String,
    pub categories: Vec<String>,
    pub icons: Vec<ManifestIcon>,
    pub screenshots: Vec<Screenshot>,
    pub features: Vec<String>,
    pub related_applications: Vec<RelatedApplication>,
    pub prefer_related_applications: bool,
    pub shortcuts: Vec<Shortcut>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl Default for WebAppManifest {
    fn default() -> Self {
        Self {
            name: "SOULFRIEND - Mental Health Support".to_string(),
            short_name: "SOULFRIEND".to_string(),
            description: "AI-powered mental health assessment and support platform".to_string(),
            version: "2.0.0".to_string(),
            start_url: "/".to_string(),
            display: "standalone".to_string(),
            orientation: "portrait-primary".to_string(),
            theme_color: "#667eea".to_string(),
            background_color: "#ffffff".to_string(),
            scope: "/".to_string(),
            lang: "vi-VN".to_string(),
            dir: "ltr".to_string(),
            categories: strings(&["health", "medical", "wellness"]),
            icons: ICON_SIZES.iter().copied().map(ManifestIcon::png).collect(),
            screenshots: vec![
                Screenshot {
                    src: "/static/screenshot-desktop.png".to_string(),
                    sizes: "1280x720".to_string(),
                    mime_type: "image/png".to_string(),
                    form_factor: "wide".to_string(),
                },
                Screenshot {
                    src: "/static/screenshot-mobile.png".to_string(),
                    sizes: "390x844".to_string(),
                    mime_type: "image/png".to_string(),
                    form_factor: "narrow".to_string(),
                },
            ],
            features: strings(&[
                "cross-platform",
                "offline-support",
                "push-notifications",
                "installable",
            ]),
            related_applications: Vec::new(),
            prefer_related_applications: false,
            shortcuts: vec![
                Shortcut {
                    name: "Quick Assessment".to_string(),
                    short_name: "Assessment".to_string(),
                    description: "Start a quick mental health assessment".to_string(),
                    url: "/assessment".to_string(),
                    icons: vec![ManifestIcon::png(96)],
                },
                Shortcut {
                    name: "View Results".to_string(),
                    short_name: "Results".to_string(),
                    description: "View your assessment results".to_string(),
                    url: "/results".to_string(),
                    icons: vec![ManifestIcon::png(96)],
                },
            ],
        }
    }
}

impl WebAppManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the colour used for the browser chrome.
    #[must_use]
    pub fn with_theme_color(mut self, color: &str) -> Self {
        self.theme_color = color.to_string();
        self
    }

    /// Sets the manifest version string.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_is_installable() {
        let manifest = WebAppManifest::default();
        assert_eq!(manifest.display, "standalone");
        assert_eq!(manifest.start_url, "/");
        assert_eq!(manifest.lang, "vi-VN");
        // Install criteria need at least a 192 and a 512 icon
        assert!(manifest.icons.iter().any(|i| i.sizes == "192x192"));
        assert!(manifest.icons.iter().any(|i| i.sizes == "512x512"));
        assert_eq!(manifest.icons.len(), ICON_SIZES.len());
    }

    #[test]
    fn json_uses_manifest_field_names() {
        let json: serde_json::Value =
            serde_json::from_str(&WebAppManifest::default().to_json().unwrap()).unwrap();
        assert_eq!(json["short_name"], "SOULFRIEND");
        assert_eq!(json["theme_color"], "#667eea");
        assert_eq!(json["icons"][0]["type"], "image/png");
        assert_eq!(json["icons"][0]["src"], "/static/icon-72.png");
        assert_eq!(json["screenshots"][1]["form_factor"], "narrow");
        assert_eq!(json["shortcuts"][0]["url"], "/assessment");
        assert_eq!(json["prefer_related_applications"], false);
    }

    #[test]
    fn builders_override_fields() {
        let manifest = WebAppManifest::new()
            .with_theme_color("#000000")
            .with_version("2.1.0");
        assert_eq!(manifest.theme_color, "#000000");
        assert_eq!(manifest.version, "2.1.0");
    }
}
