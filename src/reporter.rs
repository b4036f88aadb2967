//! Reporting interface
//!
//! The analytics backend is an opaque, fire-and-forget sink. Observers and
//! interaction wrappers only see the [`Reporter`] trait; failures it raises
//! are swallowed at the call site by [`report_best_effort`].

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::coalescer::lock;
use crate::encoder::EnvelopeEncoder;
use crate::error::EngageError;
use crate::milestone::Milestone;
use crate::types::{AnalyticsEvent, CtaCategory, LinkCategory, Metadata};

/// Sink for structured analytics events
pub trait Reporter: Send + Sync {
    /// Deliver one event to the backend
    fn send(&self, event: &AnalyticsEvent) -> Result<(), EngageError>;

    fn report_scroll_milestone(&self, percentage: Milestone, location: &str) -> Result<(), EngageError> {
        self.send(&AnalyticsEvent::ScrollMilestone {
            percentage,
            location: location.to_string(),
        })
    }

    fn report_reading_milestone(&self, content_id: &str, percentage: Milestone) -> Result<(), EngageError> {
        self.send(&AnalyticsEvent::ReadingMilestone {
            content_id: content_id.to_string(),
            percentage,
        })
    }

    fn report_cta_activation(
        &self,
        name: &str,
        location: &str,
        category: CtaCategory,
        metadata: Option<Metadata>,
    ) -> Result<(), EngageError> {
        self.send(&AnalyticsEvent::CtaActivation {
            name: name.to_string(),
            location: location.to_string(),
            category,
            metadata,
        })
    }

    fn report_link_activation(&self, destination: &str, text: &str, category: LinkCategory) -> Result<(), EngageError> {
        self.send(&AnalyticsEvent::LinkActivation {
            destination: destination.to_string(),
            text: text.to_string(),
            category,
        })
    }
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn send(&self, event: &AnalyticsEvent) -> Result<(), EngageError> {
        (**self).send(event)
    }
}

/// Run one reporting call, swallowing any error or panic from the reporter.
///
/// `event` names the event in the warning log. Returns whether the reporter
/// accepted it.
pub fn report_best_effort<F>(reporter: &dyn Reporter, event: &str, report: F) -> bool
where
    F: FnOnce(&dyn Reporter) -> Result<(), EngageError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| report(reporter))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(event, error = %e, "analytics report failed");
            false
        }
        Err(_) => {
            warn!(event, "analytics reporter panicked");
            false
        }
    }
}

/// Keeps every event in memory, in delivery order
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        lock(&self.events).clone()
    }

    /// Remove and return the events received so far
    pub fn drain(&self) -> Vec<AnalyticsEvent> {
        std::mem::take(&mut *lock(&self.events))
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }
}

impl Reporter for MemoryReporter {
    fn send(&self, event: &AnalyticsEvent) -> Result<(), EngageError> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

/// Writes one JSON envelope per line
pub struct NdjsonReporter<W> {
    writer: Mutex<W>,
    encoder: EnvelopeEncoder,
}

impl<W: Write + Send> NdjsonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_encoder(writer, EnvelopeEncoder::new())
    }

    pub fn with_encoder(writer: W, encoder: EnvelopeEncoder) -> Self {
        Self {
            writer: Mutex::new(writer),
            encoder,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Reporter for NdjsonReporter<W> {
    fn send(&self, event: &AnalyticsEvent) -> Result<(), EngageError> {
        let line = self.encoder.encode_to_json(event)?;
        let mut writer = lock(&self.writer);
        writeln!(writer, "{line}").map_err(|e| EngageError::ReportFailed(e.to_string()))
    }
}

/// Logs each event through `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn send(&self, event: &AnalyticsEvent) -> Result<(), EngageError> {
        let payload = serde_json::to_string(event)?;
        info!(event = event.name(), %payload, "analytics event");
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn send(&self, _event: &AnalyticsEvent) -> Result<(), EngageError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Always rejects
    pub(crate) struct FailingReporter;

    impl Reporter for FailingReporter {
        fn send(&self, _event: &AnalyticsEvent) -> Result<(), EngageError> {
            Err(EngageError::ReportFailed("backend unreachable".to_string()))
        }
    }

    /// Panics on every call
    pub(crate) struct PanickingReporter;

    impl Reporter for PanickingReporter {
        fn send(&self, _event: &AnalyticsEvent) -> Result<(), EngageError> {
            panic!("analytics script blew up")
        }
    }

    #[test]
    fn test_provided_methods_build_events() {
        let reporter = MemoryReporter::new();
        reporter.report_scroll_milestone(Milestone::P25, "/about").unwrap();
        reporter.report_reading_milestone("Keynote notes", Milestone::P100).unwrap();
        reporter
            .report_link_activation("mailto:hi@example.com", "Email me", LinkCategory::Email)
            .unwrap();

        let events = reporter.drain();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            AnalyticsEvent::ReadingMilestone {
                content_id: "Keynote notes".to_string(),
                percentage: Milestone::P100,
            }
        );
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_best_effort_swallows_errors_and_panics() {
        let report = |r: &dyn Reporter| r.report_scroll_milestone(Milestone::P50, "/");

        assert!(!report_best_effort(&FailingReporter, "scroll_milestone", report));
        assert!(!report_best_effort(&PanickingReporter, "scroll_milestone", report));
        assert!(report_best_effort(&NoopReporter, "scroll_milestone", report));
    }

    #[test]
    fn test_ndjson_reporter_writes_one_envelope_per_line() {
        let reporter = NdjsonReporter::with_encoder(Vec::new(), EnvelopeEncoder::with_instance_id("test".to_string()));
        reporter.report_scroll_milestone(Milestone::P25, "/").unwrap();
        reporter.report_scroll_milestone(Milestone::P50, "/").unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["producer"]["instance_id"], "test");
        assert_eq!(second["event"]["percentage"], 50);
    }

    #[test]
    fn test_arc_reporter_delegates() {
        let inner = Arc::new(MemoryReporter::new());
        let shared: Arc<dyn Reporter> = inner.clone();
        shared.report_scroll_milestone(Milestone::P75, "/").unwrap();
        assert_eq!(inner.len(), 1);
    }
}
