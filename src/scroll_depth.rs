//! Scroll depth observer
//!
//! Tracks how far down the whole document the visitor has scrolled, with one
//! milestone scope per navigation location.

use tracing::debug;

use crate::milestone::{ratio_to_percent, Milestone, MilestoneSet, MilestoneTracker};
use crate::reporter::{report_best_effort, Reporter};
use crate::types::DocumentMetrics;

/// Location reported before the first navigation signal arrives
const DEFAULT_LOCATION: &str = "/";

/// Overall scroll percentage for a document sample.
///
/// `round((scroll_top + viewport_height) / document_height * 100)`, clamped to
/// `[0, 100]`. Returns `None` when no usable document height is available yet.
pub fn scroll_progress(metrics: &DocumentMetrics) -> Option<u8> {
    let total = metrics.document_height();
    if total <= 0.0 {
        return None;
    }

    let reached = metrics.scroll_top + metrics.viewport_height;
    if !reached.is_finite() {
        return None;
    }

    Some(ratio_to_percent(reached / total))
}

/// Scope key for a location: fragment always dropped, query dropped unless
/// query changes are configured to start a new scope.
pub fn scope_key(location: &str, include_query: bool) -> String {
    let without_fragment = location.split('#').next().unwrap_or_default();
    let key = if include_query {
        without_fragment
    } else {
        without_fragment.split('?').next().unwrap_or_default()
    };

    if key.is_empty() {
        DEFAULT_LOCATION.to_string()
    } else {
        key.to_string()
    }
}

/// Document scroll-depth observer
#[derive(Debug, Clone, Default)]
pub struct ScrollDepthObserver {
    location: Option<String>,
    scope: Option<String>,
    reset_on_query_change: bool,
    tracker: MilestoneTracker,
}

impl ScrollDepthObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat query-string-only changes as a new scope
    pub fn with_query_reset(reset_on_query_change: bool) -> Self {
        Self {
            reset_on_query_change,
            ..Self::default()
        }
    }

    /// Apply a navigation signal.
    ///
    /// When the scope key changes the milestone set is cleared before any
    /// further sample is evaluated. Returns whether a new scope started.
    /// Samples taken before the first navigation belong to the `/` scope.
    pub fn navigate(&mut self, location: &str) -> bool {
        let scope = scope_key(location, self.reset_on_query_change);
        self.location = Some(location.to_string());

        let current = self.scope.as_deref().unwrap_or(DEFAULT_LOCATION);
        if current == scope {
            self.scope = Some(scope);
            return false;
        }

        debug!(from = %current, to = %scope, "scroll depth scope reset");
        self.scope = Some(scope);
        self.tracker.reset();
        true
    }

    /// Evaluate one document sample and report newly crossed milestones.
    pub fn sample(&mut self, metrics: &DocumentMetrics, reporter: &dyn Reporter) -> Vec<Milestone> {
        let Some(progress) = scroll_progress(metrics) else {
            debug!("document height unavailable, skipping scroll sample");
            return Vec::new();
        };

        let newly_fired = self.tracker.observe(progress);
        let location = self.location();
        for milestone in &newly_fired {
            debug!(%milestone, location, "scroll milestone");
            report_best_effort(reporter, "scroll_milestone", |r| {
                r.report_scroll_milestone(*milestone, location)
            });
        }
        newly_fired
    }

    /// Current location, or `/` before the first navigation
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or(DEFAULT_LOCATION)
    }

    pub fn fired(&self) -> &MilestoneSet {
        self.tracker.fired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::FailingReporter;
    use crate::reporter::MemoryReporter;
    use crate::types::AnalyticsEvent;
    use pretty_assertions::assert_eq;

    fn page(scroll_top: f64) -> DocumentMetrics {
        // 4000px document, 1000px viewport
        DocumentMetrics::new(scroll_top, 1000.0, vec![3990.0, 4000.0, 1000.0])
    }

    #[test]
    fn test_progress_formula() {
        assert_eq!(scroll_progress(&page(0.0)), Some(25));
        assert_eq!(scroll_progress(&page(1000.0)), Some(50));
        assert_eq!(scroll_progress(&page(3000.0)), Some(100));
        // Overscroll (rubber-banding) clamps
        assert_eq!(scroll_progress(&page(3200.0)), Some(100));
    }

    #[test]
    fn test_zero_height_is_skipped() {
        let metrics = DocumentMetrics::new(0.0, 800.0, vec![0.0, 0.0]);
        assert_eq!(scroll_progress(&metrics), None);

        let reporter = MemoryReporter::new();
        let mut observer = ScrollDepthObserver::new();
        assert!(observer.sample(&metrics, &reporter).is_empty());
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_scope_key() {
        assert_eq!(scope_key("/blog/post?ref=x#intro", false), "/blog/post");
        assert_eq!(scope_key("/blog/post?ref=x#intro", true), "/blog/post?ref=x");
        assert_eq!(scope_key("", false), "/");
        assert_eq!(scope_key("?q=1", false), "/");
    }

    #[test]
    fn test_navigation_resets_scope() {
        let reporter = MemoryReporter::new();
        let mut observer = ScrollDepthObserver::new();

        observer.navigate("/speaking");
        observer.sample(&page(1000.0), &reporter);
        assert_eq!(observer.fired().percents(), vec![25, 50]);

        assert!(observer.navigate("/about"));
        assert!(observer.fired().is_empty());

        // 30% of a 4000px page
        let fired = observer.sample(&DocumentMetrics::new(200.0, 1000.0, vec![4000.0]), &reporter);
        assert_eq!(fired, vec![Milestone::P25]);

        let events = reporter.events();
        assert_eq!(
            events.last(),
            Some(&AnalyticsEvent::ScrollMilestone {
                percentage: Milestone::P25,
                location: "/about".to_string(),
            })
        );
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_same_location_keeps_scope() {
        let reporter = MemoryReporter::new();
        let mut observer = ScrollDepthObserver::new();

        observer.navigate("/about");
        observer.sample(&page(1000.0), &reporter);

        assert!(!observer.navigate("/about"));
        assert!(!observer.navigate("/about?utm_source=mail"));
        assert_eq!(observer.fired().percents(), vec![25, 50]);
        assert_eq!(observer.location(), "/about?utm_source=mail");
    }

    #[test]
    fn test_query_reset_when_configured() {
        let reporter = MemoryReporter::new();
        let mut observer = ScrollDepthObserver::with_query_reset(true);

        observer.navigate("/search?q=rust");
        observer.sample(&page(0.0), &reporter);
        assert!(observer.navigate("/search?q=tokio"));
        assert!(observer.fired().is_empty());
    }

    #[test]
    fn test_milestones_reported_once_in_order() {
        let reporter = MemoryReporter::new();
        let mut observer = ScrollDepthObserver::new();
        observer.navigate("/");

        for top in [0.0, 3000.0, 0.0, 3000.0] {
            observer.sample(&page(top), &reporter);
        }

        let percentages: Vec<u8> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                AnalyticsEvent::ScrollMilestone { percentage, .. } => Some(percentage.percent()),
                _ => None,
            })
            .collect();
        assert_eq!(percentages, vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_samples_before_first_navigation_share_root_scope() {
        let reporter = MemoryReporter::new();
        let mut observer = ScrollDepthObserver::new();

        observer.sample(&page(1000.0), &reporter);
        assert!(!observer.navigate("/"));
        observer.sample(&page(1000.0), &reporter);

        assert_eq!(observer.fired().percents(), vec![25, 50]);
        assert_eq!(reporter.len(), 2);

        // Leaving the implicit scope still resets
        assert!(observer.navigate("/about"));
        assert!(observer.fired().is_empty());
    }

    #[test]
    fn test_reporter_failure_still_records_milestone() {
        let mut observer = ScrollDepthObserver::new();
        let fired = observer.sample(&page(1000.0), &FailingReporter);

        assert_eq!(fired, vec![Milestone::P25, Milestone::P50]);
        assert_eq!(observer.location(), "/");
    }
}
