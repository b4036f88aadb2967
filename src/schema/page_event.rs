//! engage.page_event.v1 schema definition
//!
//! A page event is one timestamped signal from the host page:
//! - Navigation (location changes)
//! - Geometry samples (scroll, resize)
//! - Content region lifecycle (mount, update, unmount)
//! - Discrete interactions (CTA and link clicks)
//! - Clock ticks that only advance time

use serde::{Deserialize, Serialize};

use crate::types::{CtaCategory, DocumentMetrics, LinkCategory, Metadata, RegionMetrics};

/// Current schema version
pub const SCHEMA_VERSION: &str = "engage.page_event.v1";

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEventKind {
    /// The location changed (client-side routing or full load)
    Navigate { location: String },
    /// The document scrolled
    Scroll(DocumentMetrics),
    /// The viewport was resized
    Resize(DocumentMetrics),
    /// A tracked content region appeared
    RegionMount { content_id: String, top: f64, height: f64 },
    /// A tracked content region moved or changed size
    RegionUpdate { content_id: String, top: f64, height: f64 },
    /// A tracked content region went away
    RegionUnmount { content_id: String },
    CtaClick {
        name: String,
        location: String,
        category: CtaCategory,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    LinkClick {
        destination: String,
        text: String,
        category: LinkCategory,
        #[serde(default)]
        external: bool,
    },
    /// Time passes, nothing else
    Tick,
}

impl PageEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            PageEventKind::Navigate { .. } => "navigate",
            PageEventKind::Scroll(_) => "scroll",
            PageEventKind::Resize(_) => "resize",
            PageEventKind::RegionMount { .. } => "region_mount",
            PageEventKind::RegionUpdate { .. } => "region_update",
            PageEventKind::RegionUnmount { .. } => "region_unmount",
            PageEventKind::CtaClick { .. } => "cta_click",
            PageEventKind::LinkClick { .. } => "link_click",
            PageEventKind::Tick => "tick",
        }
    }
}

/// The main engage.page_event.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEvent {
    /// Host clock, milliseconds. Non-decreasing within a trace.
    pub at_ms: u64,
    #[serde(flatten)]
    pub kind: PageEventKind,
}

impl PageEvent {
    pub fn new(at_ms: u64, kind: PageEventKind) -> Self {
        Self { at_ms, kind }
    }

    pub fn navigate(at_ms: u64, location: impl Into<String>) -> Self {
        Self::new(
            at_ms,
            PageEventKind::Navigate {
                location: location.into(),
            },
        )
    }

    pub fn scroll(at_ms: u64, metrics: DocumentMetrics) -> Self {
        Self::new(at_ms, PageEventKind::Scroll(metrics))
    }

    pub fn region_mount(at_ms: u64, content_id: impl Into<String>, region: RegionMetrics) -> Self {
        Self::new(
            at_ms,
            PageEventKind::RegionMount {
                content_id: content_id.into(),
                top: region.top,
                height: region.height,
            },
        )
    }

    pub fn region_unmount(at_ms: u64, content_id: impl Into<String>) -> Self {
        Self::new(
            at_ms,
            PageEventKind::RegionUnmount {
                content_id: content_id.into(),
            },
        )
    }

    pub fn tick(at_ms: u64) -> Self {
        Self::new(at_ms, PageEventKind::Tick)
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Validate a single event in isolation
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.kind {
            PageEventKind::Navigate { .. } | PageEventKind::Tick => Ok(()),
            PageEventKind::Scroll(metrics) | PageEventKind::Resize(metrics) => {
                // Overscroll reports a negative scroll_top
                check_finite("scroll_top", metrics.scroll_top)?;
                check_geometry("viewport_height", metrics.viewport_height)?;
                for height in &metrics.height_signals {
                    check_geometry("height_signals", *height)?;
                }
                Ok(())
            }
            PageEventKind::RegionMount { content_id, top, height }
            | PageEventKind::RegionUpdate { content_id, top, height } => {
                check_identifier("content_id", content_id)?;
                check_geometry("top", *top)?;
                check_geometry("height", *height)
            }
            PageEventKind::RegionUnmount { content_id } => check_identifier("content_id", content_id),
            PageEventKind::CtaClick { name, .. } => check_identifier("name", name),
            PageEventKind::LinkClick { destination, .. } => check_identifier("destination", destination),
        }
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteGeometry { field });
    }
    Ok(())
}

fn check_geometry(field: &'static str, value: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeGeometry { field, value });
    }
    Ok(())
}

fn check_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier { field });
    }
    Ok(())
}

/// Validation errors for page events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is not a finite number")]
    NonFiniteGeometry { field: &'static str },

    #[error("{field} must not be negative, got {value}")]
    NegativeGeometry { field: &'static str, value: f64 },

    #[error("{field} must not be empty")]
    EmptyIdentifier { field: &'static str },

    #[error("event at {at_ms} ms precedes previous event at {previous_ms} ms")]
    OutOfOrder { at_ms: u64, previous_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_scroll_event() {
        let json = r#"{
            "at_ms": 120,
            "type": "scroll",
            "scroll_top": 640.0,
            "viewport_height": 800.0,
            "height_signals": [3200.0, 3180.0]
        }"#;

        let event: PageEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.at_ms, 120);
        assert_eq!(
            event.kind,
            PageEventKind::Scroll(DocumentMetrics::new(640.0, 800.0, vec![3200.0, 3180.0]))
        );
        assert_eq!(event.kind_name(), "scroll");
    }

    #[test]
    fn test_deserialize_interactions() {
        let cta: PageEvent = serde_json::from_str(
            r#"{"at_ms": 5, "type": "cta_click", "name": "Book a talk", "location": "hero", "category": "booking"}"#,
        )
        .unwrap();
        assert!(matches!(
            cta.kind,
            PageEventKind::CtaClick {
                category: CtaCategory::Booking,
                metadata: None,
                ..
            }
        ));

        let link: PageEvent = serde_json::from_str(
            r#"{"at_ms": 6, "type": "link_click", "destination": "/about", "text": "About", "category": "internal"}"#,
        )
        .unwrap();
        assert!(matches!(link.kind, PageEventKind::LinkClick { external: false, .. }));
    }

    #[test]
    fn test_serialize_is_flat() {
        let event = PageEvent::region_mount(10, "Post", RegionMetrics::new(1200.0, 900.0));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "region_mount");
        assert_eq!(json["at_ms"], 10);
        assert_eq!(json["content_id"], "Post");
        assert_eq!(json["height"], 900.0);

        let tick = serde_json::to_string(&PageEvent::tick(50)).unwrap();
        assert_eq!(tick, r#"{"at_ms":50,"type":"tick"}"#);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let result = serde_json::from_str::<PageEvent>(
            r#"{"at_ms": 1, "type": "cta_click", "name": "x", "location": "y", "category": "banner"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        assert!(PageEvent::navigate(0, "/").validate().is_ok());

        let overscroll = PageEvent::scroll(0, DocumentMetrics::new(-5.0, 800.0, vec![2000.0]));
        assert!(overscroll.validate().is_ok());

        let negative = PageEvent::scroll(0, DocumentMetrics::new(0.0, -800.0, vec![2000.0]));
        assert_eq!(
            negative.validate(),
            Err(ValidationError::NegativeGeometry {
                field: "viewport_height",
                value: -800.0,
            })
        );

        let unnamed = PageEvent::region_unmount(0, "  ");
        assert_eq!(
            unnamed.validate(),
            Err(ValidationError::EmptyIdentifier { field: "content_id" })
        );

        let nan = PageEvent::region_mount(0, "Post", RegionMetrics::new(0.0, f64::NAN));
        assert_eq!(nan.validate(), Err(ValidationError::NonFiniteGeometry { field: "height" }));
    }
}
