//! Fault log.
//!
//! [`FaultLog`] is a `tracing` layer that keeps the most recent WARN and
//! ERROR events in a bounded ring buffer, together with the `tool` and
//! `error` fields when present. Read them through a [`FaultReader`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A captured warning or error.
#[derive(Debug, Clone)]
pub struct Fault {
    /// Seconds since the log was created.
    pub elapsed_secs: f64,
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Tool the event was about, if it named one.
    pub tool: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug)]
struct FaultBuffer {
    faults: VecDeque<Fault>,
    capacity: usize,
    start_time: Instant,
}

impl FaultBuffer {
    fn push(&mut self, fault: Fault) {
        if self.faults.len() >= self.capacity {
            self.faults.pop_front();
        }
        self.faults.push_back(fault);
    }
}

/// Layer capturing WARN and ERROR events.
#[derive(Debug, Clone)]
pub struct FaultLog {
    buffer: Arc<Mutex<FaultBuffer>>,
}

impl FaultLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(FaultBuffer {
                faults: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                start_time: Instant::now(),
            })),
        }
    }

    pub fn reader(&self) -> FaultReader {
        FaultReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for FaultLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // Lower levels are more severe: ERROR < WARN < INFO
        if *metadata.level() > Level::WARN {
            return;
        }

        let mut visitor = FaultVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut buf) = self.buffer.lock() {
            let elapsed_secs = buf.start_time.elapsed().as_secs_f64();
            buf.push(Fault {
                elapsed_secs,
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message: visitor.message,
                tool: visitor.tool,
                error: visitor.error,
            });
        }
    }
}

/// Read handle for a [`FaultLog`].
#[derive(Debug, Clone)]
pub struct FaultReader {
    buffer: Arc<Mutex<FaultBuffer>>,
}

impl FaultReader {
    pub fn entries(&self) -> Vec<Fault> {
        self.buffer
            .lock()
            .map(|buf| buf.faults.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Faults that named `tool`.
    pub fn for_tool(&self, tool: &str) -> Vec<Fault> {
        self.entries()
            .into_iter()
            .filter(|fault| fault.tool.as_deref() == Some(tool))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.faults.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct FaultVisitor {
    message: String,
    tool: Option<String>,
    error: Option<String>,
}

impl FaultVisitor {
    fn record(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "tool" => self.tool = Some(value),
            "error" => self.error = Some(value),
            _ => {}
        }
    }
}

impl Visit for FaultVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn test_captures_only_warnings_and_errors() {
        let log = FaultLog::new(10);
        let reader = log.reader();
        let _guard = tracing_subscriber::registry().with(log).set_default();

        tracing::info!("fine");
        tracing::warn!(tool = "jwt", error = "bad header", "Check failed");
        tracing::error!("broken");

        let faults = reader.entries();
        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].level, Level::WARN);
        assert_eq!(faults[0].tool.as_deref(), Some("jwt"));
        assert_eq!(faults[0].error.as_deref(), Some("bad header"));
        assert_eq!(faults[0].message, "Check failed");
        assert_eq!(faults[1].level, Level::ERROR);
    }

    #[test]
    fn test_display_fields_are_captured() {
        let log = FaultLog::new(10);
        let reader = log.reader();
        let _guard = tracing_subscriber::registry().with(log).set_default();

        let name = String::from("base64");
        tracing::warn!(tool = %name, "Check failed");

        assert_eq!(reader.for_tool("base64").len(), 1);
        assert!(reader.for_tool("url").is_empty());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let log = FaultLog::new(2);
        let reader = log.reader();
        let _guard = tracing_subscriber::registry().with(log).set_default();

        tracing::warn!("one");
        tracing::warn!("two");
        tracing::warn!("three");

        let messages: Vec<_> = reader.entries().into_iter().map(|f| f.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn test_empty_reader() {
        let reader = FaultLog::new(4).reader();
        assert!(reader.is_empty());
        assert_eq!(reader.len(), 0);
    }
}
