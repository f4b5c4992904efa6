//! Topic-based fan-out for live tracking events.
//!
//! Topics are computed deterministically from the event being published
//! (task, global admin feed, per-staff feed) rather than kept as ambient
//! room state. Delivery is at-most-once: there is no history or replay, and
//! a subscriber that joins late must pull durable tracking history over HTTP
//! to catch up. Within a single topic, messages from one publisher are
//! observed in publish order; across topics no ordering is guaranteed.

use std::{
    collections::HashMap,
    fmt,
    sync::RwLock,
};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Everyone watching one task.
    Task(Uuid),
    /// Supervisors watching all staff at once.
    AdminTracking,
    /// Supervisors watching one staff member across tasks.
    AdminStaff(Uuid),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Task(id) => write!(f, "task:{id}"),
            Topic::AdminTracking => write!(f, "admin:tracking"),
            Topic::AdminStaff(id) => write!(f, "admin:staff:{id}"),
        }
    }
}

pub struct Broker<T> {
    channels: RwLock<HashMap<Topic, broadcast::Sender<T>>>,
}

impl<T> Default for Broker<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Broker<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Publish to one topic. Returns the number of live subscribers the
    /// event reached; zero is not an error. Channels without receivers are
    /// dropped rather than accumulated.
    pub fn publish(&self, topic: &Topic, event: T) -> usize {
        let mut channels = self.channels.write().unwrap();
        match channels.get(topic) {
            Some(sender) => match sender.send(event) {
                Ok(receivers) => receivers,
                Err(_) => {
                    channels.remove(topic);
                    0
                }
            },
            None => 0,
        }
    }

    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<T> {
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Subscription as a stream, for WS forwarding handlers.
    pub fn stream(&self, topic: &Topic) -> BroadcastStream<T> {
        BroadcastStream::new(self.subscribe(topic))
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.channels
            .read()
            .unwrap()
            .get(topic)
            .map_or(0, |sender| sender.receiver_count())
    }
}
