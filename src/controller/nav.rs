//! Mobile navigation bar.

use serde::{Deserialize, Serialize};

/// One entry of the mobile navigation bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub page: String,
    pub label: String,
}

impl NavItem {
    /// An item with the built-in label for known pages, or the page name.
    #[must_use]
    pub fn for_page(page: &str) -> Self {
        let label = match page {
            "assessment" => "📝 Đánh giá",
            "results" => "📊 Kết quả",
            "resources" => "📚 Tài nguyên",
            other => other,
        };
        Self {
            page: page.to_string(),
            label: label.to_string(),
        }
    }
}

/// Active-page state for the mobile navigation bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileNav {
    items: Vec<NavItem>,
    active: Option<String>,
}

impl MobileNav {
    #[must_use]
    pub fn new<S: AsRef<str>>(pages: &[S]) -> Self {
        Self {
            items: pages.iter().map(|p| NavItem::for_page(p.as_ref())).collect(),
            active: None,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[NavItem] {
        &self.items
    }

    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Marks `page` active. Unknown pages and the current page are ignored.
    pub fn select(&mut self, page: &str) -> bool {
        if self.active.as_deref() == Some(page) || !self.items.iter().any(|i| i.page == page) {
            return false;
        }
        log::debug!("Navigating to {page}");
        self.active = Some(page.to_string());
        true
    }
}
