//! In-process pub/sub for progress events (§5, §6.1).
//!
//! §9 redesign flag ("Stateful module globals / singletons"): the teacher
//! workspace's own `spatial::get_distance_cache` and
//! `ProdByBuddha-rust_agency`'s `orchestrator::event_bus::AGENCY_EVENT_BUS`
//! are both process-wide statics. This bus is instead explicitly
//! constructed by the caller and carries no global instance; dropping the
//! last `Arc<EventBus>` tears it down.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::collaborators::EventSink;
use crate::model::RunId;

const RING_BUFFER_CAPACITY: usize = 100;
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    Started,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub run_id: RunId,
    pub agent_name: String,
    pub step_type: String,
    pub state: EventState,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Bounded ring buffer of the last 100 events plus broadcast subscriber
/// queues. Publish order is preserved per publisher; cross-publisher
/// order is best-effort (§5).
pub struct EventBus {
    ring_buffer: Mutex<VecDeque<Event>>,
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { ring_buffer: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)), sender }
    }

    pub fn publish(&self, event: Event) {
        {
            let mut buffer = self.ring_buffer.lock().expect("event bus ring buffer mutex poisoned");
            if buffer.len() == RING_BUFFER_CAPACITY {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());
        }
        // Publishing is best-effort: a subscriber lagging past its queue
        // capacity simply misses events rather than blocking the publisher.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Snapshot of the retained ring buffer, oldest first.
    pub fn recent_events(&self) -> Vec<Event> {
        self.ring_buffer.lock().expect("event bus ring buffer mutex poisoned").iter().cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The bus is itself the default `EventSink` collaborator (§6.1); the run
/// controller is free to substitute another sink (e.g. one that also
/// forwards to SSE) as long as it preserves per-publisher order.
#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, event: Event) {
        EventBus::publish(self, event);
    }
}
