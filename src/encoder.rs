//! Analytics envelope encoder
//!
//! Wraps analytics events in a self-describing envelope (producer, event id,
//! emission time) before they leave the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngageError;
use crate::types::AnalyticsEvent;
use crate::{ENGAGE_VERSION, PRODUCER_NAME};

/// Current envelope schema version
pub const ENVELOPE_VERSION: &str = "engage.analytics_event.v1";

/// Producer metadata stamped on every envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// An analytics event ready for the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub schema_version: String,
    pub event_id: String,
    pub emitted_at: DateTime<Utc>,
    pub producer: EnvelopeProducer,
    pub event: AnalyticsEvent,
}

/// Envelope encoder
#[derive(Debug, Clone)]
pub struct EnvelopeEncoder {
    instance_id: String,
}

impl Default for EnvelopeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, event: &AnalyticsEvent) -> EventEnvelope {
        EventEnvelope {
            schema_version: ENVELOPE_VERSION.to_string(),
            event_id: Uuid::new_v4().to_string(),
            emitted_at: Utc::now(),
            producer: EnvelopeProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGAGE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            event: event.clone(),
        }
    }

    /// Encode to a single-line JSON string
    pub fn encode_to_json(&self, event: &AnalyticsEvent) -> Result<String, EngageError> {
        let envelope = self.encode(event);
        serde_json::to_string(&envelope).map_err(EngageError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milestone::Milestone;
    use pretty_assertions::assert_eq;

    fn sample_event() -> AnalyticsEvent {
        AnalyticsEvent::ReadingMilestone {
            content_id: "Designing for attention".to_string(),
            percentage: Milestone::P75,
        }
    }

    #[test]
    fn test_encode_envelope() {
        let encoder = EnvelopeEncoder::with_instance_id("instance-1".to_string());
        let envelope = encoder.encode(&sample_event());

        assert_eq!(envelope.schema_version, ENVELOPE_VERSION);
        assert_eq!(envelope.producer.name, PRODUCER_NAME);
        assert_eq!(envelope.producer.version, ENGAGE_VERSION);
        assert_eq!(envelope.producer.instance_id, "instance-1");
        assert_eq!(envelope.event, sample_event());
    }

    #[test]
    fn test_encode_to_json_is_single_line() {
        let encoder = EnvelopeEncoder::new();
        let json = encoder.encode_to_json(&sample_event()).unwrap();

        assert!(!json.contains('\n'));
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event, sample_event());
    }

    #[test]
    fn test_unique_ids() {
        let encoder = EnvelopeEncoder::new();
        let a = encoder.encode(&sample_event());
        let b = encoder.encode(&sample_event());

        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.producer.instance_id, b.producer.instance_id);
        assert_ne!(EnvelopeEncoder::new().instance_id(), encoder.instance_id());
    }
}
