//! Observability
//!
//! - Structured JSON logging with a configurable minimum severity
//! - Typed lifecycle events
//! - Begin/complete scopes around checkin, refresh and cluster sync
//! - Atomic counters
//!
//! Observability is read-only: nothing here influences the outcome of a
//! checkin or refresh, and logging never fails an operation.
//!
//! ```ignore
//! use arbordb::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::VersionCreated, &[("version", "1.0")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_checkins_completed();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields. Fatal events go to stderr.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    if event.is_fatal() {
        Logger::fatal(event.as_str(), fields);
    } else {
        Logger::info(event.as_str(), fields);
    }
}
