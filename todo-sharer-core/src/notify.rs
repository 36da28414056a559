//! Transient user notifications published by the todo store.

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;

/// How long success messages for item changes stay visible.
pub const SHORT_DURATION: Duration = Duration::from_secs(2);
/// List-level confirmations and informational messages.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(3);
/// Errors from item mutations.
pub const ERROR_DURATION: Duration = Duration::from_secs(4);
/// Errors from sharing, which carry a longer store-provided message.
pub const LONG_ERROR_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    /// How long a UI should keep it on screen.
    pub duration: Duration,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
            duration: DEFAULT_DURATION,
        }
    }

    pub fn success(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
            duration,
        }
    }

    pub fn error(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
            duration,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Fan-out of notifications to every subscribed presentation component.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        // No subscribers is fine: nobody is looking.
        let _ = self.sender.send(notification);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
