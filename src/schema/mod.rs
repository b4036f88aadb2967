//! Unified engage.page_event.v1 schema
//!
//! This module defines the host-agnostic input schema for page activity.
//! Traces can be replayed offline or streamed one event at a time.

mod adapter;
mod page_event;

pub use adapter::*;
pub use page_event::*;
