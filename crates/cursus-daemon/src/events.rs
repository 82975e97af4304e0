//! Domain event bus.
//!
//! Events are pushed to subscribers (notification service, gamification,
//! analytics) as JSON-RPC notifications. Each subscriber has an independent
//! buffer; a subscriber that falls more than the bus capacity behind loses
//! the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use cursus_types::events::Event;

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "progress", "certificate", "enrollment", "system".
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Only events whose payload names one of these courses.
    #[serde(default)]
    pub course_ids: Option<Vec<String>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(event_type = ?event.event_type, "event emitted");
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref categories) = self.categories {
            let category = event.event_type.category();
            if !categories.iter().any(|c| c == category) {
                return false;
            }
        }

        // Events without a course (e.g. DaemonStarted) pass the course filter.
        if let Some(ref course_ids) = self.course_ids {
            if let Some(cid) = event.payload.get("course_id").and_then(|v| v.as_str()) {
                if !course_ids.iter().any(|id| id == cid) {
                    return false;
                }
            }
        }

        true
    }
}
