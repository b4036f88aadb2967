//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Engage.
//! It drives the observers and interaction wrappers from a stream of page
//! events, owning every milestone scope and every pending coalesced sample.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::coalescer::CoalescingWindow;
use crate::config::EngageConfig;
use crate::encoder::{EnvelopeEncoder, EventEnvelope};
use crate::error::EngageError;
use crate::interaction::{TrackedCta, TrackedLink};
use crate::milestone::MilestoneSet;
use crate::reading_progress::ReadingProgressObserver;
use crate::reporter::{MemoryReporter, Reporter};
use crate::schema::{PageEvent, PageEventAdapter, PageEventKind};
use crate::scroll_depth::ScrollDepthObserver;
use crate::types::{DocumentMetrics, RegionMetrics, Viewport};

/// Replay a page-event trace and return the analytics envelopes it produced.
///
/// # Example
/// ```ignore
/// let envelopes = replay(&events, EngageConfig::default())?;
/// ```
pub fn replay(events: &[PageEvent], config: EngageConfig) -> Result<Vec<EventEnvelope>, EngageError> {
    let encoder = encoder_for(&config);
    let reporter = Arc::new(MemoryReporter::new());

    let mut processor = EngagementProcessor::with_config(config, reporter.clone())?;
    processor.process_trace(events)?;

    Ok(reporter.drain().iter().map(|event| encoder.encode(event)).collect())
}

/// Replay an NDJSON trace and return one JSON envelope per analytics event.
pub fn replay_ndjson(trace: &str, config: EngageConfig) -> Result<Vec<String>, EngageError> {
    let events = PageEventAdapter::parse_ndjson(trace)?;
    replay(&events, config)?
        .iter()
        .map(|envelope| serde_json::to_string(envelope).map_err(EngageError::from))
        .collect()
}

/// Envelope encoder honouring the configured instance id
pub fn encoder_for(config: &EngageConfig) -> EnvelopeEncoder {
    match &config.instance_id {
        Some(id) => EnvelopeEncoder::with_instance_id(id.clone()),
        None => EnvelopeEncoder::new(),
    }
}

/// One mounted content region
struct RegionScope {
    observer: ReadingProgressObserver,
    region: RegionMetrics,
    window: CoalescingWindow<Viewport>,
}

/// Which scope a due sample belongs to
enum SampleTarget {
    Document,
    Region(String),
}

/// Stateful processor for a single page session.
///
/// Time is whatever the caller says it is: every event carries `at_ms` and
/// coalesced samples fire once a later event (or [`advance`](Self::advance))
/// reaches their deadline.
pub struct EngagementProcessor {
    config: EngageConfig,
    reporter: Arc<dyn Reporter>,
    scroll: ScrollDepthObserver,
    scroll_window: CoalescingWindow<DocumentMetrics>,
    regions: BTreeMap<String, RegionScope>,
    viewport: Option<Viewport>,
    now_ms: u64,
    events_handled: usize,
    events_skipped: usize,
}

impl EngagementProcessor {
    /// Create a processor with default settings
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self::build(EngageConfig::default(), reporter)
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: EngageConfig, reporter: Arc<dyn Reporter>) -> Result<Self, EngageError> {
        config.validate()?;
        Ok(Self::build(config, reporter))
    }

    fn build(config: EngageConfig, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            scroll: ScrollDepthObserver::with_query_reset(config.reset_on_query_change),
            scroll_window: CoalescingWindow::new(config.quiet_period()),
            config,
            reporter,
            regions: BTreeMap::new(),
            viewport: None,
            now_ms: 0,
            events_handled: 0,
            events_skipped: 0,
        }
    }

    pub fn config(&self) -> &EngageConfig {
        &self.config
    }

    /// Handle one page event.
    ///
    /// Samples whose quiet period ended at or before `event.at_ms` are
    /// evaluated first, then the event itself is applied. An event that fails
    /// validation only skips its own tick; an event older than the processor
    /// clock is an error.
    pub fn handle(&mut self, event: &PageEvent) -> Result<(), EngageError> {
        if event.at_ms < self.now_ms {
            return Err(EngageError::InvalidEvent(format!(
                "{} at {} ms precedes current time {} ms",
                event.kind_name(),
                event.at_ms,
                self.now_ms
            )));
        }

        self.advance(event.at_ms);
        let now = event.at_ms;

        if let Err(e) = event.validate() {
            warn!(event = event.kind_name(), at_ms = event.at_ms, error = %e, "invalid page event skipped");
            self.events_skipped += 1;
            return Ok(());
        }

        match &event.kind {
            PageEventKind::Navigate { location } => {
                if self.scroll.navigate(location) && self.scroll_window.cancel() {
                    debug!(location = %location, "pending scroll sample dropped on navigation");
                }
            }
            PageEventKind::Scroll(metrics) | PageEventKind::Resize(metrics) => {
                let viewport = metrics.viewport();
                self.viewport = Some(viewport);
                self.scroll_window.schedule(now, metrics.clone());
                for scope in self.regions.values_mut() {
                    scope.window.schedule(now, viewport);
                }
            }
            PageEventKind::RegionMount { content_id, top, height } => {
                self.mount_region(content_id, RegionMetrics::new(*top, *height));
            }
            PageEventKind::RegionUpdate { content_id, top, height } => match self.regions.get_mut(content_id) {
                Some(scope) => scope.region = RegionMetrics::new(*top, *height),
                None => debug!(content_id = %content_id, "update for unmounted region ignored"),
            },
            PageEventKind::RegionUnmount { content_id } => {
                if self.regions.remove(content_id).is_some() {
                    debug!(content_id = %content_id, "region unmounted, scope discarded");
                } else {
                    debug!(content_id = %content_id, "unmount for unknown region ignored");
                }
            }
            PageEventKind::CtaClick {
                name,
                location,
                category,
                metadata,
            } => {
                let mut cta = TrackedCta::new(name, location, *category);
                cta.metadata = metadata.clone();
                cta.track(self.reporter.as_ref());
            }
            PageEventKind::LinkClick {
                destination,
                text,
                category,
                external,
            } => {
                let link = TrackedLink::new(destination, text, *category).external(*external);
                debug!(route = ?link.route(), "link followed");
                link.track(self.reporter.as_ref());
            }
            PageEventKind::Tick => {}
        }

        self.events_handled += 1;
        Ok(())
    }

    fn mount_region(&mut self, content_id: &str, region: RegionMetrics) {
        if self.regions.contains_key(content_id) {
            debug!(content_id = %content_id, "region re-mounted, starting a fresh scope");
        }

        let mut observer = ReadingProgressObserver::new(content_id);
        if self.config.evaluate_on_mount {
            match &self.viewport {
                Some(viewport) => {
                    observer.sample(viewport, Some(&region), self.reporter.as_ref());
                }
                None => debug!(content_id = %content_id, "viewport unknown, skipping mount evaluation"),
            }
        }

        self.regions.insert(
            content_id.to_string(),
            RegionScope {
                observer,
                region,
                window: CoalescingWindow::new(self.config.quiet_period()),
            },
        );
    }

    /// Move the clock forward and evaluate every sample now due.
    ///
    /// Returns the number of evaluations performed.
    pub fn advance(&mut self, now_ms: u64) -> usize {
        self.now_ms = self.now_ms.max(now_ms);
        self.evaluate_pending(Some(self.now_ms))
    }

    /// Evaluate everything still pending, regardless of deadlines.
    pub fn finish(&mut self) -> usize {
        self.evaluate_pending(None)
    }

    /// Feed a whole trace, then flush. Returns the number of events handled.
    pub fn process_trace(&mut self, events: &[PageEvent]) -> Result<usize, EngageError> {
        for event in events {
            self.handle(event)?;
        }
        self.finish();
        Ok(events.len())
    }

    fn evaluate_pending(&mut self, now_ms: Option<u64>) -> usize {
        let due = |deadline: Option<u64>| deadline.filter(|d| now_ms.map_or(true, |now| *d <= now));

        let mut targets: Vec<(u64, SampleTarget)> = Vec::new();
        if let Some(deadline) = due(self.scroll_window.deadline()) {
            targets.push((deadline, SampleTarget::Document));
        }
        for (content_id, scope) in &self.regions {
            if let Some(deadline) = due(scope.window.deadline()) {
                targets.push((deadline, SampleTarget::Region(content_id.clone())));
            }
        }
        targets.sort_by_key(|(deadline, _)| *deadline);

        let reporter = self.reporter.as_ref();
        let mut evaluated = 0;
        for (_, target) in targets {
            match target {
                SampleTarget::Document => {
                    if let Some(metrics) = self.scroll_window.flush() {
                        self.scroll.sample(&metrics, reporter);
                        evaluated += 1;
                    }
                }
                SampleTarget::Region(content_id) => {
                    if let Some(scope) = self.regions.get_mut(&content_id) {
                        if let Some(viewport) = scope.window.flush() {
                            scope.observer.sample(&viewport, Some(&scope.region), reporter);
                            evaluated += 1;
                        }
                    }
                }
            }
        }
        evaluated
    }

    /// Location of the current scroll-depth scope
    pub fn scroll_location(&self) -> &str {
        self.scroll.location()
    }

    pub fn scroll_fired(&self) -> &MilestoneSet {
        self.scroll.fired()
    }

    /// Fired set for a mounted region, `None` once unmounted
    pub fn reading_fired(&self, content_id: &str) -> Option<&MilestoneSet> {
        self.regions.get(content_id).map(|scope| scope.observer.fired())
    }

    pub fn mounted_regions(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    /// Whether any coalesced sample is waiting for its deadline
    pub fn has_pending(&self) -> bool {
        self.scroll_window.is_pending() || self.regions.values().any(|scope| scope.window.is_pending())
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn events_handled(&self) -> usize {
        self.events_handled
    }

    /// Events dropped because they failed validation
    pub fn events_skipped(&self) -> usize {
        self.events_skipped
    }
}
