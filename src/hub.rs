//! Change notifications for live queries.
//!
//! Writers broadcast on a topic after every committed change; live queries
//! subscribe and re-fetch when told something changed.

use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// What a live query listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Any list document, share or profile.
    Lists,
    /// The items of one list.
    Items(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Updated,
}

/// Broadcast channels per topic.
pub struct ChangeHub {
    channels: RwLock<HashMap<Topic, broadcast::Sender<ChangeEvent>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to `topic`. Channels whose receivers have all been
    /// dropped are pruned here.
    pub async fn subscribe(&self, topic: Topic) -> broadcast::Receiver<ChangeEvent> {
        let mut channels = self.channels.write().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);

        if let Some(sender) = channels.get(&topic) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(16);
            channels.insert(topic, sender);
            receiver
        }
    }

    pub async fn broadcast(&self, topic: &Topic, event: ChangeEvent) {
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(topic) {
            // Ignore send errors (no subscribers)
            let _ = sender.send(event);
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
