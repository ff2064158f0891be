//! Pull-to-refresh gesture recognition.

/// Recognizes a downward pull that starts at the top of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PullToRefresh {
    threshold: f64,
    max_drift: f64,
    start: Option<(f64, f64)>,
}

impl PullToRefresh {
    #[must_use]
    pub const fn new(threshold: f64, max_drift: f64) -> Self {
        Self {
            threshold,
            max_drift,
            start: None,
        }
    }

    pub const fn touch_start(&mut self, x: f64, y: f64) {
        self.start = Some((x, y));
    }

    /// Ends the gesture. Returns true if it should reload the page.
    ///
    /// A touch end without a preceding start is ignored.
    pub fn touch_end(&mut self, x: f64, y: f64, scroll_y: f64) -> bool {
        let Some((start_x, start_y)) = self.start.take() else {
            return false;
        };
        is_pull(
            start_y - y,
            start_x - x,
            scroll_y,
            self.threshold,
            self.max_drift,
        )
    }
}

/// `diff_y` and `diff_x` are start minus end, so a downward pull has a
/// negative `diff_y`. Overscroll above the top counts as the top.
#[must_use]
pub fn is_pull(diff_y: f64, diff_x: f64, scroll_y: f64, threshold: f64, max_drift: f64) -> bool {
    diff_y < -threshold && diff_x.abs() < max_drift && scroll_y <= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gesture() -> PullToRefresh {
        PullToRefresh::new(100.0, 50.0)
    }

    #[test]
    fn long_straight_pull_at_top_reloads() {
        let mut g = gesture();
        g.touch_start(200.0, 100.0);
        assert!(g.touch_end(210.0, 250.0, 0.0));
    }

    #[test]
    fn short_pull_does_not_reload() {
        let mut g = gesture();
        g.touch_start(200.0, 100.0);
        assert!(!g.touch_end(200.0, 200.0, 0.0));
    }

    #[test]
    fn scrolled_page_does_not_reload() {
        let mut g = gesture();
        g.touch_start(200.0, 100.0);
        assert!(!g.touch_end(200.0, 400.0, 12.0));
    }

    #[test]
    fn diagonal_swipe_does_not_reload() {
        let mut g = gesture();
        g.touch_start(100.0, 100.0);
        assert!(!g.touch_end(160.0, 400.0, 0.0));
    }

    #[test]
    fn end_without_start_is_ignored() {
        let mut g = gesture();
        assert!(!g.touch_end(0.0, 500.0, 0.0));
        g.touch_start(0.0, 0.0);
        assert!(g.touch_end(0.0, 500.0, 0.0));
        // The start is consumed
        assert!(!g.touch_end(0.0, 500.0, 0.0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn upward_swipes_never_reload(
                x in -1000.0f64..1000.0,
                y in 0.0f64..2000.0,
                up in 0.0f64..2000.0,
            ) {
                let mut g = gesture();
                g.touch_start(x, y);
                prop_assert!(!g.touch_end(x, y - up, 0.0));
            }

            #[test]
            fn pulls_past_threshold_reload(
                x in -1000.0f64..1000.0,
                y in 0.0f64..2000.0,
                extra in 0.001f64..1000.0,
                drift in -49.9f64..49.9,
            ) {
                let mut g = gesture();
                g.touch_start(x, y);
                prop_assert!(g.touch_end(x + drift, y + 100.0 + extra, 0.0));
            }

            #[test]
            fn scrolled_pages_never_reload(
                dy in 0.0f64..2000.0,
                scroll in 0.5f64..5000.0,
            ) {
                prop_assert!(!is_pull(-dy, 0.0, scroll, 100.0, 50.0));
            }
        }
    }
}
