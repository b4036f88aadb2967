//! Core types for the Synheart Engage trackers
//!
//! This module defines the data that flows through the engagement subsystem:
//! page geometry samples, the closed interaction category sets, immutable
//! interaction records, and the analytics events handed to the reporter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::EngageError;
use crate::milestone::Milestone;
use crate::reporter::Reporter;

/// Free-form metadata attached to a CTA activation
pub type Metadata = Map<String, Value>;

// ============================================================================
// Geometry
// ============================================================================

/// Whole-document scroll geometry, in CSS pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetrics {
    /// Current vertical scroll offset
    pub scroll_top: f64,
    /// Height of the visible viewport
    pub viewport_height: f64,
    /// Every document height source the host could read (body/documentElement
    /// scroll, offset and client heights). They disagree under some layouts.
    #[serde(default)]
    pub height_signals: Vec<f64>,
}

impl DocumentMetrics {
    pub fn new(scroll_top: f64, viewport_height: f64, height_signals: Vec<f64>) -> Self {
        Self {
            scroll_top,
            viewport_height,
            height_signals,
        }
    }

    /// Largest finite height signal, or 0 when none is available
    pub fn document_height(&self) -> f64 {
        self.height_signals
            .iter()
            .copied()
            .filter(|h| h.is_finite())
            .fold(0.0, f64::max)
    }

    /// The viewport portion of this sample
    pub fn viewport(&self) -> Viewport {
        Viewport {
            scroll_top: self.scroll_top,
            height: self.viewport_height,
        }
    }
}

/// Visible window onto the document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, height: f64) -> Self {
        Self { scroll_top, height }
    }
}

/// Position of a content region in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionMetrics {
    /// Offset of the region's top edge from the document top
    pub top: f64,
    pub height: f64,
}

impl RegionMetrics {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }
}

// ============================================================================
// Interaction categories
// ============================================================================

/// Closed set of call-to-action categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaCategory {
    Contact,
    Booking,
    Download,
    Newsletter,
    Navigation,
    Social,
}

impl CtaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CtaCategory::Contact => "contact",
            CtaCategory::Booking => "booking",
            CtaCategory::Download => "download",
            CtaCategory::Newsletter => "newsletter",
            CtaCategory::Navigation => "navigation",
            CtaCategory::Social => "social",
        }
    }
}

impl FromStr for CtaCategory {
    type Err = EngageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contact" => Ok(CtaCategory::Contact),
            "booking" => Ok(CtaCategory::Booking),
            "download" => Ok(CtaCategory::Download),
            "newsletter" => Ok(CtaCategory::Newsletter),
            "navigation" => Ok(CtaCategory::Navigation),
            "social" => Ok(CtaCategory::Social),
            other => Err(EngageError::UnknownCategory(format!("cta category '{other}'"))),
        }
    }
}

impl fmt::Display for CtaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of link categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCategory {
    Internal,
    External,
    Social,
    Email,
    Phone,
    Download,
}

impl LinkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkCategory::Internal => "internal",
            LinkCategory::External => "external",
            LinkCategory::Social => "social",
            LinkCategory::Email => "email",
            LinkCategory::Phone => "phone",
            LinkCategory::Download => "download",
        }
    }
}

impl FromStr for LinkCategory {
    type Err = EngageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "internal" => Ok(LinkCategory::Internal),
            "external" => Ok(LinkCategory::External),
            "social" => Ok(LinkCategory::Social),
            "email" => Ok(LinkCategory::Email),
            "phone" => Ok(LinkCategory::Phone),
            "download" => Ok(LinkCategory::Download),
            other => Err(EngageError::UnknownCategory(format!("link category '{other}'"))),
        }
    }
}

impl fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Interaction records
// ============================================================================

/// Which wrapper produced an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Cta,
    Link,
}

/// Category of an interaction, tied to its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteractionCategory {
    Cta(CtaCategory),
    Link(LinkCategory),
}

/// One user gesture, recorded once and never mutated.
///
/// Fields are private; the record is built by the interaction wrappers and
/// only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionEvent {
    kind: InteractionKind,
    /// CTA name or link destination
    subject: String,
    /// CTA location or link text
    context: String,
    category: InteractionCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

impl InteractionEvent {
    pub fn cta(
        name: impl Into<String>,
        location: impl Into<String>,
        category: CtaCategory,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            kind: InteractionKind::Cta,
            subject: name.into(),
            context: location.into(),
            category: InteractionCategory::Cta(category),
            metadata,
        }
    }

    pub fn link(destination: impl Into<String>, text: impl Into<String>, category: LinkCategory) -> Self {
        Self {
            kind: InteractionKind::Link,
            subject: destination.into(),
            context: text.into(),
            category: InteractionCategory::Link(category),
            metadata: None,
        }
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn category(&self) -> InteractionCategory {
        self.category
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Hand this interaction to the matching reporting function
    pub fn report(&self, reporter: &dyn Reporter) -> Result<(), EngageError> {
        match self.category {
            InteractionCategory::Cta(category) => {
                reporter.report_cta_activation(&self.subject, &self.context, category, self.metadata.clone())
            }
            InteractionCategory::Link(category) => {
                reporter.report_link_activation(&self.subject, &self.context, category)
            }
        }
    }

    /// The analytics event this interaction is reported as
    pub fn to_analytics_event(&self) -> AnalyticsEvent {
        match self.category {
            InteractionCategory::Cta(category) => AnalyticsEvent::CtaActivation {
                name: self.subject.clone(),
                location: self.context.clone(),
                category,
                metadata: self.metadata.clone(),
            },
            InteractionCategory::Link(category) => AnalyticsEvent::LinkActivation {
                destination: self.subject.clone(),
                text: self.context.clone(),
                category,
            },
        }
    }
}

// ============================================================================
// Analytics events
// ============================================================================

/// A structured payload handed to the reporting interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    /// Overall document scroll depth crossed a milestone
    ScrollMilestone { percentage: Milestone, location: String },
    /// A content region's reading progress crossed a milestone
    ReadingMilestone { content_id: String, percentage: Milestone },
    CtaActivation {
        name: String,
        location: String,
        category: CtaCategory,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    LinkActivation {
        destination: String,
        text: String,
        category: LinkCategory,
    },
}

impl AnalyticsEvent {
    /// Short event name, matching the serialized `event` tag
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::ScrollMilestone { .. } => "scroll_milestone",
            AnalyticsEvent::ReadingMilestone { .. } => "reading_milestone",
            AnalyticsEvent::CtaActivation { .. } => "cta_activation",
            AnalyticsEvent::LinkActivation { .. } => "link_activation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_height_takes_largest_signal() {
        let metrics = DocumentMetrics::new(0.0, 800.0, vec![2000.0, 2400.0, f64::NAN, 1800.0]);
        assert_eq!(metrics.document_height(), 2400.0);

        let empty = DocumentMetrics::new(0.0, 800.0, vec![]);
        assert_eq!(empty.document_height(), 0.0);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Contact".parse::<CtaCategory>().unwrap(), CtaCategory::Contact);
        assert_eq!(" email ".parse::<LinkCategory>().unwrap(), LinkCategory::Email);

        let err = "banner".parse::<CtaCategory>().unwrap_err();
        assert!(matches!(err, EngageError::UnknownCategory(_)));
    }

    #[test]
    fn test_interaction_event_maps_to_analytics_event() {
        let mut metadata = Metadata::new();
        metadata.insert("variant".to_string(), Value::from("b"));

        let event = InteractionEvent::cta("Book a talk", "hero", CtaCategory::Booking, Some(metadata.clone()));
        assert_eq!(event.kind(), InteractionKind::Cta);
        assert_eq!(
            event.to_analytics_event(),
            AnalyticsEvent::CtaActivation {
                name: "Book a talk".to_string(),
                location: "hero".to_string(),
                category: CtaCategory::Booking,
                metadata: Some(metadata),
            }
        );

        let link = InteractionEvent::link("/about", "About", LinkCategory::Internal);
        assert_eq!(link.to_analytics_event().name(), "link_activation");
    }

    #[test]
    fn test_interaction_reports_through_matching_function() {
        let reporter = crate::reporter::MemoryReporter::new();
        let cta = InteractionEvent::cta("Book a talk", "hero", CtaCategory::Booking, None);
        let link = InteractionEvent::link("tel:+15550100", "Call", LinkCategory::Phone);

        cta.report(&reporter).unwrap();
        link.report(&reporter).unwrap();

        assert_eq!(reporter.events(), vec![cta.to_analytics_event(), link.to_analytics_event()]);
    }

    #[test]
    fn test_analytics_event_wire_format() {
        let event = AnalyticsEvent::ScrollMilestone {
            percentage: Milestone::P50,
            location: "/speaking".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "scroll_milestone");
        assert_eq!(json["percentage"], 50);
        assert_eq!(json["location"], "/speaking");

        let cta = AnalyticsEvent::CtaActivation {
            name: "Subscribe".to_string(),
            location: "footer".to_string(),
            category: CtaCategory::Newsletter,
            metadata: None,
        };
        let json = serde_json::to_value(&cta).unwrap();
        assert_eq!(json["category"], "newsletter");
        assert!(json.get("metadata").is_none());
    }
}
