//! Run event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers (a status command,
//! a tray front-end) can catch up on what the last run did.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::media::{ApplyOutcome, BatchSummary, MediaFlavor};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Manual,
    Scheduled,
}

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Run lifecycle -------------------------------------------------------
    RunStarted {
        run_id: Uuid,
        trigger: RunTrigger,
    },
    /// A run was requested while another one was active.
    RunSkipped {
        trigger: RunTrigger,
    },
    RunCompleted {
        run_id: Uuid,
        summary: BatchSummary,
    },
    RunFailed {
        run_id: Uuid,
        error: String,
    },

    // -- Phases --------------------------------------------------------------
    ScanCompleted {
        run_id: Uuid,
        movies: usize,
        tv_shows: usize,
        anime: usize,
    },
    ItemProcessed {
        run_id: Uuid,
        flavor: MediaFlavor,
        index: usize,
        total: usize,
        title: String,
        outcome: ApplyOutcome,
    },
    BatchCompleted {
        run_id: Uuid,
        flavor: MediaFlavor,
        summary: BatchSummary,
    },

    // -- Maintenance ---------------------------------------------------------
    CacheCleaned {
        removed: usize,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
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

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let run_id = Uuid::new_v4();
        bus.broadcast(EventPayload::RunStarted {
            run_id,
            trigger: RunTrigger::Manual,
        });

        let event = rx.try_recv().unwrap();
        match &event.payload {
            EventPayload::RunStarted { run_id: received, trigger } => {
                assert_eq!(*received, run_id);
                assert_eq!(*trigger, RunTrigger::Manual);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for _ in 0..150 {
            bus.broadcast(EventPayload::CacheCleaned { removed: 1 });
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        for removed in 0..5 {
            bus.broadcast(EventPayload::CacheCleaned { removed });
        }
        let recent = bus.recent_events(2);
        assert_eq!(recent.len(), 2);
        assert!(matches!(
            recent[0].payload,
            EventPayload::CacheCleaned { removed: 4 }
        ));
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::RunSkipped {
            trigger: RunTrigger::Scheduled,
        });
    }

    #[test]
    fn item_event_serializes_tagged() {
        let event = Event::new(EventPayload::ItemProcessed {
            run_id: Uuid::new_v4(),
            flavor: MediaFlavor::Anime,
            index: 1,
            total: 3,
            title: "Attack on Titan".into(),
            outcome: ApplyOutcome::Applied,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"item_processed""#));
        assert!(json.contains(r#""flavor":"anime""#));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
    }
}
