//! Synheart Engage - Milestone-based engagement telemetry for content-heavy pages
//!
//! Engage turns raw page activity into a small set of discrete analytics
//! events: scroll depth and reading progress milestones (25/50/75/100%),
//! plus one event per tracked call-to-action or link activation.
//!
//! ## Modules
//!
//! - **Observers**: pure progress functions and per-scope milestone state
//!   (`scroll_depth`, `reading_progress`, `milestone`)
//! - **Sampling**: the coalescing primitive and the processor that drives the
//!   observers from timestamped page events (`coalescer`, `pipeline`, `live`)
//! - **Interactions**: tracked CTA and link wrappers (`interaction`)
//! - **Reporting**: the analytics sink and its envelope encoding
//!   (`reporter`, `encoder`)

pub mod coalescer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod interaction;
pub mod live;
pub mod milestone;
pub mod pipeline;
pub mod reading_progress;
pub mod reporter;
pub mod schema;
pub mod scroll_depth;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngageConfig;
pub use error::EngageError;
pub use interaction::{LinkRoute, Navigator, TrackedCta, TrackedLink};
pub use milestone::{Milestone, MilestoneSet, MilestoneTracker};
pub use pipeline::{replay, replay_ndjson, EngagementProcessor};
pub use reporter::{MemoryReporter, Reporter};
pub use types::{AnalyticsEvent, CtaCategory, LinkCategory};

// Schema exports
pub use schema::{PageEvent, PageEventAdapter, SCHEMA_VERSION};

// Live listener exports
pub use live::{ReadingProgressListener, ScrollDepthListener};

/// Engage version embedded in all analytics envelopes
pub const ENGAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for analytics envelopes
pub const PRODUCER_NAME: &str = "synheart-engage";
