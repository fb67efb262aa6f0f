//! Publisher that records every publish.

use crate::traits::Publisher;
use std::collections::HashSet;

/// In-memory [`Publisher`] for tests and bring-up.
///
/// Every channel is connected unless [`disconnect`](Self::disconnect)ed.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: Vec<(String, String)>,
    disconnected: HashSet<String>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `channel` as having no consumer.
    pub fn disconnect(&mut self, channel: impl Into<String>) {
        self.disconnected.insert(channel.into());
    }

    pub fn connect(&mut self, channel: &str) {
        self.disconnected.remove(channel);
    }

    /// All `(channel, value)` pairs in publish order.
    pub fn events(&self) -> &[(String, String)] {
        &self.events
    }

    /// Values published on `channel`, in order.
    pub fn values_for(&self, channel: &str) -> Vec<&str> {
        self.events
            .iter()
            .filter(|(name, _)| name == channel)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn count_for(&self, channel: &str) -> usize {
        self.events.iter().filter(|(name, _)| name == channel).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, channel: &str, value: &str) {
        self.events.push((channel.to_string(), value.to_string()));
    }

    fn is_connected(&self, channel: &str) -> bool {
        !self.disconnected.contains(channel)
    }
}
