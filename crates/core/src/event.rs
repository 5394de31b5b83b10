//! Domain events for store and agent activity.
//!
//! Stores and agents publish; log tails and UI refreshers subscribe. The
//! bus is fire-and-forget, so publishers never block on slow consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::message::Role;

/// Everything worth announcing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new thread was created
    ThreadCreated {
        thread_id: String,
        user_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A message was saved to a thread
    MessageSaved {
        thread_id: String,
        message_id: String,
        role: Role,
        order: i64,
        step_order: i64,
        timestamp: DateTime<Utc>,
    },

    /// An agent finished generating a response
    ResponseGenerated {
        thread_id: String,
        agent_name: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },
}

/// Multi-consumer event fan-out over `tokio::sync::broadcast`.
///
/// Every subscriber sees every event and filters for what it cares about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// A bus that buffers up to `capacity` events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Announce an event. Having no subscribers is not an error.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(Arc::new(event));
    }

    /// A receiver over all events published from now on.
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
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::MessageSaved {
            thread_id: "t1".into(),
            message_id: "m1".into(),
            role: Role::User,
            order: 0,
            step_order: 0,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::MessageSaved {
                thread_id, order, ..
            } => {
                assert_eq!(thread_id, "t1");
                assert_eq!(*order, 0);
            }
            _ => panic!("Expected MessageSaved event"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ThreadCreated {
            thread_id: "t1".into(),
            user_id: None,
            timestamp: Utc::now(),
        });
    }
}
