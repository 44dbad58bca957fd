//! Event system for learning-platform operations
//!
//! Services emit a [`LearningEvent`] after each successful write. Listeners
//! use them for audit logging.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum LearningEvent {
    // Trail events
    TrailCreated {
        id: String,
        name: String,
    },
    TrailUpdated {
        id: String,
    },
    TrailDeleted {
        id: String,
    },

    // Category events
    CategoryCreated {
        id: String,
        trail_id: String,
        order: i64,
    },
    CategoryUpdated {
        id: String,
    },
    CategoryMoved {
        id: String,
        from_trail_id: String,
        to_trail_id: String,
    },
    CategoryDeleted {
        id: String,
        trail_id: String,
    },
    CategoriesReordered {
        trail_id: String,
        count: usize,
    },

    // Module events
    ModuleCreated {
        id: String,
        category_id: String,
    },
    ModuleUpdated {
        id: String,
    },
    ModuleDeleted {
        id: String,
    },

    // Challenge events
    ChallengeCreated {
        id: String,
        category_id: String,
    },
    ChallengeDeleted {
        id: String,
    },

    // Progress events
    ModuleCompletionChanged {
        user_id: String,
        module_id: String,
        completed: bool,
    },
    ChallengeAttempted {
        user_id: String,
        challenge_id: String,
        percentage: f64,
        passed: bool,
    },

    UserRegistered {
        id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &LearningEvent);
}

/// Event bus for broadcasting learning events
pub struct EventBus {
    sender: broadcast::Sender<LearningEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LearningEvent) {
        trace!(event = ?event, "Emitting learning event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LearningEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LearningEvent) {
        match event {
            LearningEvent::TrailCreated { id, name } => {
                info!(id = %id, name = %name, "Trail created");
            }
            LearningEvent::CategoriesReordered { trail_id, count } => {
                info!(trail_id = %trail_id, count = count, "Categories reordered");
            }
            LearningEvent::CategoryMoved { id, from_trail_id, to_trail_id } => {
                info!(id = %id, from = %from_trail_id, to = %to_trail_id, "Category moved");
            }
            LearningEvent::ChallengeAttempted { user_id, challenge_id, percentage, passed } => {
                info!(
                    user_id = %user_id,
                    challenge_id = %challenge_id,
                    percentage = percentage,
                    passed = passed,
                    "Challenge attempted"
                );
            }
            LearningEvent::ModuleCompletionChanged { user_id, module_id, completed } => {
                debug!(user_id = %user_id, module_id = %module_id, completed = completed, "Module completion changed");
            }
            _ => {
                debug!(event = ?event, "Learning event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(LearningEvent::CategoriesReordered {
            trail_id: "trail-1".into(),
            count: 3,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        assert_eq!(
            event,
            LearningEvent::CategoriesReordered { trail_id: "trail-1".into(), count: 3 }
        );
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(LearningEvent::TrailDeleted { id: "t".into() });
    }
}
