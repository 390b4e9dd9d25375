//! Observability for facetdex
//!
//! - Structured JSON logging
//! - Typed events
//! - Atomic operation counters
//!
//! Observability is read-only: it never changes the outcome of an index
//! operation, and a failed log write is ignored.
//!
//! # Usage
//!
//! ```ignore
//! use facetdex::observability::{log_event, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Trace);
//! log_event(Event::ObjectAdded, &[("index", "tasks"), ("object", "T1")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // Verifies no panic for each severity class
        log_event(Event::IndexRegistered, &[("index", "tasks")]);
        log_event(Event::ObjectAdded, &[]);
        log_event(Event::QueryRejected, &[("reason", "empty model")]);
    }

    #[test]
    fn test_event_line_uses_event_severity() {
        let line = logger::capture_log(Event::GroupFlush.severity(), Event::GroupFlush.as_str(), &[]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "GROUP_FLUSH");
        assert_eq!(parsed["severity"], "INFO");
    }
}
