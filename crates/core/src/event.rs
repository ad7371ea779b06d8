//! Domain event system: observability without coupling.
//!
//! The orchestrator and workflow engine publish events as turns, tool calls
//! and nodes complete. Front ends subscribe to render progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user turn entered the orchestrator
    TurnStarted {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool call finished (any status)
    ToolInvoked {
        tool_name: String,
        status: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A workflow node produced output and was checkpointed
    NodeCompleted {
        session_id: String,
        graph_id: String,
        node: String,
        timestamp: DateTime<Utc>,
    },

    /// A workflow node failed; the run halted
    NodeFailed {
        session_id: String,
        graph_id: String,
        node: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Older turns were folded into a summary
    ContextCompacted {
        session_id: String,
        tokens_before: usize,
        tokens_after: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::NodeCompleted {
            session_id: "s1".into(),
            graph_id: "recommendation".into(),
            node: "search_places".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::NodeCompleted { node, .. } => assert_eq!(node, "search_places"),
            _ => panic!("Expected NodeCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::TurnStarted {
            session_id: "s1".into(),
            timestamp: Utc::now(),
        });
    }
}
