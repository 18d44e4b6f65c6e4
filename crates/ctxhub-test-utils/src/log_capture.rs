//! Log capture for assertions on tracing output.
//!
//! [`LogCapture`] is a `tracing` layer that records events (level, target,
//! message and structured fields) into a bounded buffer. [`LogCapture::install`]
//! sets it as the thread's default subscriber together with a test-writer
//! `fmt` layer, so captured events also show up in test output when
//! `RUST_LOG` asks for them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default number of retained events.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A single captured event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Structured fields other than `message`, rendered as strings.
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug)]
struct EventBuffer {
    events: Vec<CapturedEvent>,
    capacity: usize,
}

impl EventBuffer {
    fn push(&mut self, event: CapturedEvent) {
        if self.events.len() >= self.capacity {
            self.events.remove(0);
        }
        self.events.push(event);
    }
}

/// A `tracing` layer capturing events into a shared buffer.
#[derive(Debug, Clone)]
pub struct LogCapture {
    buffer: Arc<Mutex<EventBuffer>>,
}

impl LogCapture {
    /// Create a capture retaining at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(EventBuffer {
                events: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                capacity,
            })),
        }
    }

    /// Install a capture as this thread's default subscriber.
    ///
    /// Events are captured at every level; the guard must be held for the
    /// duration of the test.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::new(DEFAULT_CAPACITY);
        let fmt = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")),
            );
        let guard = tracing_subscriber::registry()
            .with(capture.clone())
            .with(fmt)
            .set_default();
        (capture, guard)
    }

    /// Snapshot of all captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    /// Captured events at exactly `level`.
    pub fn events_at(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    /// Whether an event at `level` has a message containing `needle`.
    pub fn has_message(&self, level: Level, needle: &str) -> bool {
        self.events_at(level)
            .iter()
            .any(|e| e.message.contains(needle))
    }

    /// Whether any event at `level` or more severe was captured.
    pub fn has_events_at_least(&self, level: Level) -> bool {
        // `Level` orders by verbosity: ERROR < WARN < INFO.
        self.events().iter().any(|e| e.level <= level)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .is_empty()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message: visitor.message,
                fields: visitor.fields,
            });
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl EventVisitor {
    fn record(&mut self, field: &Field, rendered: String) {
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.insert(field.name().to_string(), rendered);
        }
    }
}

impl Visit for EventVisitor {
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

    #[test]
    fn test_captures_message_and_fields() {
        let (capture, _guard) = LogCapture::install();

        tracing::info!(provider_id = "p1", budget_ms = 150u64, "Context provider p1 exceeded");
        tracing::error!(provider_id = %"p2", "Error resolving context");

        let events = capture.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::INFO);
        assert_eq!(events[0].fields.get("provider_id").map(String::as_str), Some("p1"));
        assert_eq!(events[0].fields.get("budget_ms").map(String::as_str), Some("150"));
        assert_eq!(events[1].fields.get("provider_id").map(String::as_str), Some("p2"));
        assert!(capture.has_message(Level::ERROR, "Error resolving context"));
        assert!(capture.has_events_at_least(Level::ERROR));
    }

    #[test]
    fn test_bounded_buffer() {
        let capture = LogCapture::new(2);
        let _guard = tracing_subscriber::registry()
            .with(capture.clone())
            .set_default();

        tracing::warn!("one");
        tracing::warn!("two");
        tracing::warn!("three");

        let events = capture.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "two");
    }

    #[test]
    fn test_poisoned_buffer_still_reports_events() {
        let capture = LogCapture::new(4);
        let _guard = tracing_subscriber::registry()
            .with(capture.clone())
            .set_default();
        tracing::info!("before poison");

        let poisoner = capture.clone();
        let _ = std::thread::spawn(move || {
            let _held = poisoner.buffer.lock().unwrap();
            panic!("poison the buffer");
        })
        .join();

        assert!(capture.buffer.is_poisoned());
        assert!(!capture.is_empty());
        assert!(capture.has_message(Level::INFO, "before poison"));
    }

    #[test]
    fn test_empty_capture() {
        let capture = LogCapture::new(4);
        assert!(capture.is_empty());
        assert!(!capture.has_events_at_least(Level::TRACE));
    }
}
