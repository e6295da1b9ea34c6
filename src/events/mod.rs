//! Event broadcasting for real-time notification of membership, ownership,
//! and recording changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   Services      │────>│    EventBus     │────>│  Subscribers    │
//! │ (membership,    │     │  (broadcast)    │     │  (admin tools,  │
//! │  resumer)       │     │                 │     │   websockets)   │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! event_bus.publish(ServerEvent::AuditLogCreated { ... });
//!
//! let mut rx = event_bus.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     // Handle event
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTopic {
    /// Membership and ownership-transfer audit events.
    Audit,
    /// Response Resumer recording lifecycle events.
    Resumer,
    /// All events (wildcard subscription).
    All,
}

impl EventTopic {
    /// `All` matches everything, otherwise exact match is required.
    pub fn matches(&self, other: &EventTopic) -> bool {
        matches!(self, EventTopic::All) || matches!(other, EventTopic::All) || self == other
    }
}

/// Server events broadcast to subscribers.
///
/// Uses `event_type` as the discriminator tag, producing JSON like:
/// ```json
/// { "event_type": "audit_log_created", "action": "add", ... }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A membership or ownership-transfer mutation was recorded (§4.1).
    AuditLogCreated {
        id: Uuid,
        timestamp: DateTime<Utc>,
        action: String,
        actor_id: Uuid,
        group_id: Uuid,
        target_user_id: Uuid,
        from_access_level: Option<String>,
        to_access_level: Option<String>,
    },

    /// A recording's state machine transitioned (§4.4.3).
    RecordingStateChanged {
        conversation_id: Uuid,
        timestamp: DateTime<Utc>,
        state: RecordingState,
    },
}

impl ServerEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            ServerEvent::AuditLogCreated { .. } => EventTopic::Audit,
            ServerEvent::RecordingStateChanged { .. } => EventTopic::Resumer,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::AuditLogCreated { .. } => "audit_log_created",
            ServerEvent::RecordingStateChanged { .. } => "recording_state_changed",
        }
    }
}

/// Mirrors the Response Resumer's per-recording state machine (§4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Open,
    Closing,
    Closed,
}

/// Central event bus for broadcasting server events.
///
/// Uses a tokio broadcast channel to allow multiple subscribers to receive
/// the same events. Events are cloned for each subscriber.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    /// Publish an event to all subscribers. Returns the number of
    /// subscribers that received it; 0 if none were listening.
    pub fn publish(&self, event: ServerEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            events_published: AtomicU64::new(self.events_published.load(Ordering::Relaxed)),
            events_dropped: AtomicU64::new(self.events_dropped.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();
        bus.publish(ServerEvent::AuditLogCreated {
            id,
            timestamp: Utc::now(),
            action: "add".to_string(),
            actor_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            target_user_id: Uuid::new_v4(),
            from_access_level: None,
            to_access_level: Some("reader".to_string()),
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic(), EventTopic::Audit);
    }

    #[test]
    fn publish_with_no_subscribers_counts_as_dropped() {
        let bus = EventBus::new();
        bus.publish(ServerEvent::RecordingStateChanged {
            conversation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            state: RecordingState::Closed,
        });
        assert_eq!(bus.events_published(), 1);
        assert_eq!(bus.events_dropped(), 1);
    }

    #[test]
    fn topic_all_matches_everything() {
        assert!(EventTopic::All.matches(&EventTopic::Audit));
        assert!(EventTopic::Resumer.matches(&EventTopic::All));
        assert!(!EventTopic::Audit.matches(&EventTopic::Resumer));
    }

    #[test]
    fn server_event_serialization_round_trips() {
        let events = vec![
            ServerEvent::AuditLogCreated {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                action: "transfer".to_string(),
                actor_id: Uuid::new_v4(),
                group_id: Uuid::new_v4(),
                target_user_id: Uuid::new_v4(),
                from_access_level: Some("owner".to_string()),
                to_access_level: Some("manager".to_string()),
            },
            ServerEvent::RecordingStateChanged {
                conversation_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                state: RecordingState::Open,
            },
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event.event_type(), parsed.event_type());
            assert_eq!(event.topic(), parsed.topic());
        }
    }
}
