//! Notification sink that remembers everything it receives

use resman_core::{Notification, Notifier};
use std::sync::{Arc, Mutex};

/// Records notifications for later assertions; clones share the record
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received, in order
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn successes(&self) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.success)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.count() - self.successes()
    }

    /// Most recent notification
    pub fn last(&self) -> Option<Notification> {
        self.received.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}
