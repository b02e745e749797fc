//! User-facing notifications
//!
//! Every settled mutation emits exactly one [`Notification`]. Delivery is
//! fire-and-forget: sinks never report back to the engine.

use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A success or failure message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub success: bool,
    pub message: String,
}

impl Notification {
    /// A success notification
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failure notification
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Sink for notifications
pub trait Notifier: Send + Sync {
    /// Deliver a notification
    fn notify(&self, notification: Notification);
}

/// Discards every notification
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Writes notifications to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        if notification.success {
            info!("{}", notification.message);
        } else {
            error!("{}", notification.message);
        }
    }
}

/// Forwards notifications into a bounded channel
pub struct ChannelNotifier {
    sender: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving half of its channel
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(err) = self.sender.try_send(notification) {
            warn!("Dropping notification: {err}");
        }
    }
}

/// Arc-wrapped notifier for sharing across tasks
#[derive(Clone)]
pub struct SharedNotifier {
    inner: Arc<dyn Notifier>,
}

impl SharedNotifier {
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self { inner }
    }
}

impl Notifier for SharedNotifier {
    fn notify(&self, notification: Notification) {
        self.inner.notify(notification);
    }
}
