//! Reading progress observer
//!
//! Tracks how much of one content region (an article body, a talk abstract)
//! has been seen, independent of the total page length. Each mounted region
//! owns its milestone scope; dropping the observer discards it.

use tracing::debug;

use crate::milestone::{ratio_to_percent, Milestone, MilestoneSet, MilestoneTracker};
use crate::reporter::{report_best_effort, Reporter};
use crate::types::{RegionMetrics, Viewport};

fn usable(viewport: &Viewport, region: &RegionMetrics) -> bool {
    viewport.scroll_top.is_finite()
        && viewport.height.is_finite()
        && region.top.is_finite()
        && region.height.is_finite()
        && region.height > 0.0
}

/// Visible pixel height of the region divided by its total height.
///
/// Visible range is the intersection of `[scroll_top, scroll_top + viewport]`
/// with `[region_top, region_top + region_height]`.
pub fn visibility_ratio(viewport: &Viewport, region: &RegionMetrics) -> f64 {
    let visible_top = viewport.scroll_top.max(region.top);
    let visible_bottom = (viewport.scroll_top + viewport.height).min(region.top + region.height);
    (visible_bottom - visible_top).max(0.0) / region.height
}

/// `(scroll_top - region_top + viewport_height) / region_height`.
///
/// Keeps climbing after the region leaves the top of the viewport, so a reader
/// who scrolled all the way through still counts as finished.
pub fn pass_through_ratio(viewport: &Viewport, region: &RegionMetrics) -> f64 {
    (viewport.scroll_top - region.top + viewport.height) / region.height
}

/// Combined reading progress: the larger of the two estimates, clamped to
/// `[0, 100]`. `None` when the region has no usable measurement.
pub fn reading_progress(viewport: &Viewport, region: &RegionMetrics) -> Option<u8> {
    if !usable(viewport, region) {
        return None;
    }

    let visibility = visibility_ratio(viewport, region);
    let pass_through = pass_through_ratio(viewport, region);
    Some(ratio_to_percent(visibility.max(pass_through)))
}

/// Reading-progress observer for one mounted content region
#[derive(Debug, Clone)]
pub struct ReadingProgressObserver {
    content_id: String,
    tracker: MilestoneTracker,
}

impl ReadingProgressObserver {
    /// Fresh scope for `content_id`, without evaluating anything
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            tracker: MilestoneTracker::new(),
        }
    }

    /// Create the scope and evaluate immediately, covering content that is
    /// already in view before any scroll happens.
    pub fn mount(
        content_id: impl Into<String>,
        viewport: &Viewport,
        region: Option<&RegionMetrics>,
        reporter: &dyn Reporter,
    ) -> (Self, Vec<Milestone>) {
        let mut observer = Self::new(content_id);
        let fired = observer.sample(viewport, region, reporter);
        (observer, fired)
    }

    /// Evaluate one sample. A missing region measurement skips the tick.
    pub fn sample(
        &mut self,
        viewport: &Viewport,
        region: Option<&RegionMetrics>,
        reporter: &dyn Reporter,
    ) -> Vec<Milestone> {
        let Some(region) = region else {
            debug!(content_id = %self.content_id, "region not measured, skipping reading sample");
            return Vec::new();
        };
        let Some(progress) = reading_progress(viewport, region) else {
            debug!(content_id = %self.content_id, "region has no height, skipping reading sample");
            return Vec::new();
        };

        let newly_fired = self.tracker.observe(progress);
        for milestone in &newly_fired {
            debug!(content_id = %self.content_id, %milestone, "reading milestone");
            report_best_effort(reporter, "reading_milestone", |r| {
                r.report_reading_milestone(&self.content_id, *milestone)
            });
        }
        newly_fired
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn fired(&self) -> &MilestoneSet {
        self.tracker.fired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemoryReporter;
    use crate::types::AnalyticsEvent;
    use pretty_assertions::assert_eq;

    // Article body 1000px tall starting 2000px down; 800px viewport.
    fn article() -> RegionMetrics {
        RegionMetrics::new(2000.0, 1000.0)
    }

    #[test]
    fn test_short_region_fully_visible() {
        let region = RegionMetrics::new(500.0, 400.0);
        let viewport = Viewport::new(500.0, 800.0);

        assert_eq!(visibility_ratio(&viewport, &region), 1.0);
        assert_eq!(reading_progress(&viewport, &region), Some(100));
    }

    #[test]
    fn test_region_below_the_fold() {
        let viewport = Viewport::new(0.0, 800.0);
        assert_eq!(visibility_ratio(&viewport, &article()), 0.0);
        assert_eq!(reading_progress(&viewport, &article()), Some(0));
    }

    #[test]
    fn test_partial_exposure() {
        // Top 200px of the article are on screen
        let viewport = Viewport::new(1400.0, 800.0);
        assert_eq!(reading_progress(&viewport, &article()), Some(20));
    }

    #[test]
    fn test_pass_through_dominates_once_bottom_reached() {
        // Region bottom aligned with viewport bottom: 80% visible, fully passed
        let viewport = Viewport::new(2200.0, 800.0);
        assert!((visibility_ratio(&viewport, &article()) - 0.8).abs() < 1e-9);
        assert_eq!(reading_progress(&viewport, &article()), Some(100));
    }

    #[test]
    fn test_scrolled_past_region_counts_as_read() {
        let viewport = Viewport::new(3500.0, 800.0);
        assert_eq!(visibility_ratio(&viewport, &article()), 0.0);
        assert_eq!(reading_progress(&viewport, &article()), Some(100));
    }

    #[test]
    fn test_degenerate_region_is_skipped() {
        let viewport = Viewport::new(0.0, 800.0);
        assert_eq!(reading_progress(&viewport, &RegionMetrics::new(0.0, 0.0)), None);
        assert_eq!(reading_progress(&viewport, &RegionMetrics::new(0.0, f64::NAN)), None);
    }

    #[test]
    fn test_mount_evaluates_immediately() {
        let reporter = MemoryReporter::new();
        let region = RegionMetrics::new(100.0, 400.0);
        let (observer, fired) =
            ReadingProgressObserver::mount("About the speaker", &Viewport::new(100.0, 800.0), Some(&region), &reporter);

        assert_eq!(fired, Milestone::ALL.to_vec());
        assert_eq!(observer.fired().len(), 4);
        assert_eq!(
            reporter.events()[0],
            AnalyticsEvent::ReadingMilestone {
                content_id: "About the speaker".to_string(),
                percentage: Milestone::P25,
            }
        );
    }

    #[test]
    fn test_missing_region_skips_tick() {
        let reporter = MemoryReporter::new();
        let (mut observer, fired) =
            ReadingProgressObserver::mount("Talk abstract", &Viewport::new(0.0, 800.0), None, &reporter);
        assert!(fired.is_empty());

        assert!(observer.sample(&Viewport::new(0.0, 800.0), None, &reporter).is_empty());
        assert!(observer.fired().is_empty());
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_progressive_reading() {
        let reporter = MemoryReporter::new();
        let mut observer = ReadingProgressObserver::new("Post");

        let mut fired = Vec::new();
        for top in [0.0, 1400.0, 1700.0, 1950.0, 1600.0, 2300.0, 2300.0] {
            fired.extend(observer.sample(&Viewport::new(top, 800.0), Some(&article()), &reporter));
        }

        assert_eq!(fired, Milestone::ALL.to_vec());
        assert_eq!(reporter.len(), 4);
    }
}
