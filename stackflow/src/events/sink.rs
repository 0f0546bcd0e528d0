//! Event sink trait and implementations.

use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

/// Trait for sinks that receive deployment events.
///
/// Emission never fails; a sink that cannot deliver drops the event.
pub trait EventSink: Send + Sync {
    /// Emits an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "workspace.started")
    /// * `data` - Optional event data
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// An event sink that logs events using the tracing framework.
///
/// Failure events are always logged at warn. Missing-output events go to
/// debug since the lookup that emits them has already warned.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Level an event of this type is logged at.
    #[must_use]
    pub fn level_for(&self, event_type: &str) -> Level {
        if event_type.ends_with(".failed") || event_type.ends_with(".halted") {
            Level::WARN
        } else if event_type.ends_with(".missing") {
            Level::DEBUG
        } else {
            self.level
        }
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let level = self.level_for(event_type);
        if level == Level::WARN {
            warn!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        } else if level == Level::DEBUG {
            debug!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit("test", Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn test_logging_sink() {
        let sink = LoggingEventSink::default();
        sink.emit("workspace.started", Some(serde_json::json!({"workspace": "infrastructure"})));
        sink.emit("workspace.failed", None);
        LoggingEventSink::debug().emit("outputs.missing", None);
    }

    #[test]
    fn test_missing_outputs_are_not_warned_again() {
        let sink = LoggingEventSink::default();
        assert_eq!(sink.level_for("outputs.missing"), Level::DEBUG);
        assert_eq!(sink.level_for("workspace.failed"), Level::WARN);
        assert_eq!(sink.level_for("sequence.halted"), Level::WARN);
        assert_eq!(sink.level_for("workspace.started"), Level::INFO);
        assert_eq!(LoggingEventSink::debug().level_for("workspace.started"), Level::DEBUG);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("event1", None);
        sink.emit("event2", Some(serde_json::json!({"data": true})));

        assert_eq!(sink.len(), 2);

        let events = sink.events();
        assert_eq!(events[0].0, "event1");
        assert_eq!(events[1].0, "event2");
    }

    #[test]
    fn test_collecting_sink_filter_and_clear() {
        let sink = CollectingEventSink::new();
        sink.emit("workspace.started", None);
        sink.emit("workspace.succeeded", None);
        sink.emit("outputs.missing", None);

        assert_eq!(sink.events_of_type("workspace.").len(), 2);
        assert_eq!(sink.events_of_type("outputs.").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
