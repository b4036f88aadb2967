//! Page event trace adapter
//!
//! Parses traces of page events and validates them as a batch.

use crate::error::EngageError;

use super::page_event::{PageEvent, ValidationError};

/// Adapter for engage.page_event.v1 traces
pub struct PageEventAdapter;

impl PageEventAdapter {
    /// Parse a JSON array of page events
    pub fn parse_array(json: &str) -> Result<Vec<PageEvent>, EngageError> {
        serde_json::from_str(json).map_err(|e| EngageError::ParseError(format!("Failed to parse trace: {e}")))
    }

    /// Parse newline-delimited JSON. Blank lines are skipped.
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<PageEvent>, EngageError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<PageEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(EngageError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Validate a batch of events, including time ordering.
    ///
    /// Only failing events are returned.
    pub fn validate_events(events: &[PageEvent]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous_ms: Option<u64> = None;

        for (index, event) in events.iter().enumerate() {
            let error = match event.validate() {
                Err(e) => Some(e),
                Ok(()) => match previous_ms {
                    Some(prev) if event.at_ms < prev => Some(ValidationError::OutOfOrder {
                        at_ms: event.at_ms,
                        previous_ms: prev,
                    }),
                    _ => None,
                },
            };

            match error {
                Some(error) => results.push(ValidationResult {
                    index,
                    kind: event.kind_name(),
                    error,
                }),
                None => previous_ms = Some(event.at_ms),
            }
        }

        results
    }
}

/// One failing event in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub kind: &'static str,
    pub error: ValidationError,
}
