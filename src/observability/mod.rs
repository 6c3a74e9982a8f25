//! Observability
//!
//! - Structured logging (JSON lines)
//! - Typed events
//! - Counters
//!
//! Observability never influences a decision: a read is served or not
//! regardless of whether the line describing it was written.
//!
//! ```ignore
//! use rangekv::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::ConfigLoaded, &[("path", "/etc/rangekv.json")]);
//! let metrics = MetricsRegistry::new();
//! metrics.increment_follower_reads_served();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event at INFO
pub fn log_event(event: Event) {
    Logger::log(Severity::Info, event.as_str(), &[]);
}

/// Log a lifecycle event with fields at INFO
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(Severity::Info, event.as_str(), fields);
}

/// Log a per-request event at TRACE.
///
/// Callers that build field values should check `Logger::enabled` first.
pub fn trace_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(Severity::Trace, event.as_str(), fields);
}
