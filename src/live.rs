//! Live listeners
//!
//! Timer-driven observers for hosts that push raw scroll callbacks instead of
//! timestamped traces. Each listener owns a [`Coalescer`] and the scope it
//! feeds; dropping the listener tears both down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::coalescer::{lock, Coalescer};
use crate::config::EngageConfig;
use crate::milestone::MilestoneSet;
use crate::reading_progress::ReadingProgressObserver;
use crate::reporter::Reporter;
use crate::scroll_depth::ScrollDepthObserver;
use crate::types::{DocumentMetrics, RegionMetrics, Viewport};

/// Observer plus a counter bumped on every scope reset
struct ScrollState {
    observer: ScrollDepthObserver,
    epoch: u64,
}

/// Document scroll-depth listener
pub struct ScrollDepthListener {
    state: Arc<Mutex<ScrollState>>,
    coalescer: Coalescer<(u64, DocumentMetrics)>,
}

impl ScrollDepthListener {
    /// Start listening on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime context.
    pub fn mount(reporter: Arc<dyn Reporter>, quiet: Duration) -> Self {
        Self::mount_with(ScrollDepthObserver::new(), reporter, quiet)
    }

    pub fn from_config(config: &EngageConfig, reporter: Arc<dyn Reporter>) -> Self {
        Self::mount_with(
            ScrollDepthObserver::with_query_reset(config.reset_on_query_change),
            reporter,
            config.quiet_period(),
        )
    }

    fn mount_with(observer: ScrollDepthObserver, reporter: Arc<dyn Reporter>, quiet: Duration) -> Self {
        let state = Arc::new(Mutex::new(ScrollState { observer, epoch: 0 }));
        let shared = Arc::clone(&state);

        let coalescer = Coalescer::new(quiet, move |(epoch, metrics): (u64, DocumentMetrics)| {
            let mut state = lock(&shared);
            // Sampled before the latest scope reset
            if state.epoch != epoch {
                return;
            }
            state.observer.sample(&metrics, reporter.as_ref());
        });

        Self { state, coalescer }
    }

    /// Raw scroll callback
    pub fn on_scroll(&self, metrics: DocumentMetrics) {
        let epoch = lock(&self.state).epoch;
        self.coalescer.call((epoch, metrics));
    }

    /// Raw resize callback
    pub fn on_resize(&self, metrics: DocumentMetrics) {
        self.on_scroll(metrics);
    }

    /// Navigation signal. A new scope cancels any pending sample.
    pub fn on_navigate(&self, location: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.observer.navigate(location) {
            return false;
        }
        state.epoch += 1;
        self.coalescer.cancel();
        debug!(location = %location, "scroll listener scope reset");
        true
    }

    pub fn location(&self) -> String {
        lock(&self.state).observer.location().to_string()
    }

    pub fn fired(&self) -> MilestoneSet {
        lock(&self.state).observer.fired().clone()
    }
}

/// Reading-progress listener for one mounted content region
pub struct ReadingProgressListener {
    content_id: String,
    observer: Arc<Mutex<ReadingProgressObserver>>,
    coalescer: Coalescer<(Viewport, Option<RegionMetrics>)>,
}

impl ReadingProgressListener {
    /// Mount the region and evaluate it immediately.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime context.
    pub fn mount(
        content_id: impl Into<String>,
        viewport: &Viewport,
        region: Option<&RegionMetrics>,
        reporter: Arc<dyn Reporter>,
        quiet: Duration,
    ) -> Self {
        let content_id = content_id.into();
        let (observer, _) = ReadingProgressObserver::mount(content_id.clone(), viewport, region, reporter.as_ref());
        let observer = Arc::new(Mutex::new(observer));
        let shared = Arc::clone(&observer);

        let coalescer = Coalescer::new(quiet, move |(viewport, region): (Viewport, Option<RegionMetrics>)| {
            lock(&shared).sample(&viewport, region.as_ref(), reporter.as_ref());
        });

        Self {
            content_id,
            observer,
            coalescer,
        }
    }

    /// Raw scroll callback with fresh geometry for the region
    pub fn on_scroll(&self, viewport: Viewport, region: Option<RegionMetrics>) {
        self.coalescer.call((viewport, region));
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn fired(&self) -> MilestoneSet {
        lock(&self.observer).fired().clone()
    }
}

impl Drop for ReadingProgressListener {
    fn drop(&mut self) {
        self.coalescer.cancel();
        debug!(content_id = %self.content_id, "reading listener unmounted");
    }
}
