use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use keepsake_schema::FlowEvent;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    FlowRestarted,
    ScreenChanged,
    AnswerRecorded,
    NavigationScheduled,
    CarouselIndexChanged,
    GalleryCompleted,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::FlowRestarted,
        Topic::ScreenChanged,
        Topic::AnswerRecorded,
        Topic::NavigationScheduled,
        Topic::CarouselIndexChanged,
        Topic::GalleryCompleted,
    ];

    pub fn from_event(event: &FlowEvent) -> Self {
        match event {
            FlowEvent::FlowRestarted { .. } => Topic::FlowRestarted,
            FlowEvent::ScreenChanged { .. } => Topic::ScreenChanged,
            FlowEvent::AnswerRecorded { .. } => Topic::AnswerRecorded,
            FlowEvent::NavigationScheduled { .. } => Topic::NavigationScheduled,
            FlowEvent::CarouselIndexChanged { .. } => Topic::CarouselIndexChanged,
            FlowEvent::GalleryCompleted { .. } => Topic::GalleryCompleted,
        }
    }
}

type Subscriber = mpsc::Sender<FlowEvent>;
type Subscribers = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

pub struct EventBus {
    subscribers: Subscribers,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<FlowEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    /// One receiver for several topics, preserving publish order across them.
    pub async fn subscribe_many(&self, topics: &[Topic]) -> mpsc::Receiver<FlowEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        for topic in topics {
            subs.entry(*topic).or_default().push(tx.clone());
        }
        rx
    }

    pub async fn publish(&self, event: FlowEvent) -> Result<()> {
        deliver(&self.subscribers, event).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BusPublisher {
    subscribers: Subscribers,
}

impl BusPublisher {
    pub async fn publish(&self, event: FlowEvent) -> Result<()> {
        deliver(&self.subscribers, event).await
    }
}

async fn deliver(subscribers: &Subscribers, event: FlowEvent) -> Result<()> {
    let topic = Topic::from_event(&event);
    let subs = subscribers.read().await;
    if let Some(subscribers) = subs.get(&topic) {
        for tx in subscribers {
            if tx.try_send(event.clone()).is_err() {
                tracing::debug!(?topic, "subscriber full or closed; event dropped");
            }
        }
    }
    Ok(())
}
