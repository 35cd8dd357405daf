//! Event sinks.

use std::sync::Mutex;

use crate::events::{CacheEvent, EventLevel};

/// Injected sink for cache events.
pub trait EventSink: Send + Sync {
    /// Record a single event.
    fn record(&self, event: CacheEvent);
}

/// Default sink emitting through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: CacheEvent) {
        match event.level() {
            EventLevel::Debug => tracing::debug!(target: "worker_cache", "{}", event.to_human()),
            EventLevel::Info => tracing::info!(target: "worker_cache", "{}", event.to_human()),
            EventLevel::Warn => tracing::warn!(target: "worker_cache", "{}", event.to_human()),
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: CacheEvent) {}
}

/// Capturing sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CacheEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().expect("sink poisoned").clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().expect("sink poisoned").len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: CacheEvent) {
        self.events.lock().expect("sink poisoned").push(event);
    }
}
