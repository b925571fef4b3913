//! FIFO queue of outbound chat messages, drained by the polling endpoint.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Abandoned front-ends stop polling; evict oldest past this point.
const MAX_QUEUED: usize = 500;

/// A single message for the front-end chat pane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Plain status or result text
    Text { body: String },
    /// Inline image as a data URI (run recording GIF)
    Image { data_uri: String },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    pub fn image(data_uri: impl Into<String>) -> Self {
        Self::Image {
            data_uri: data_uri.into(),
        }
    }
}

/// Thread-safe message queue. Messages are appended in production order and
/// returned in the same order by `drain`.
#[derive(Default)]
pub struct Outbox {
    queue: Mutex<VecDeque<OutboundMessage>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, evicting the oldest entries past the high water mark.
    pub fn push(&self, message: OutboundMessage) {
        let mut queue = self.queue.lock();
        queue.push_back(message);
        while queue.len() > MAX_QUEUED {
            queue.pop_front();
        }
    }

    /// Convenience for plain text messages.
    pub fn push_text(&self, body: impl Into<String>) {
        self.push(OutboundMessage::text(body));
    }

    /// Remove and return all queued messages, oldest first.
    pub fn drain(&self) -> Vec<OutboundMessage> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order_and_empties() {
        let outbox = Outbox::new();
        outbox.push_text("first");
        outbox.push_text("second");
        outbox.push(OutboundMessage::image("data:image/gif;base64,AAAA"));

        let drained = outbox.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], OutboundMessage::text("first"));
        assert_eq!(drained[1], OutboundMessage::text("second"));
        assert!(matches!(drained[2], OutboundMessage::Image { .. }));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let outbox = Outbox::new();
        for i in 0..(MAX_QUEUED + 10) {
            outbox.push_text(format!("msg-{}", i));
        }
        let drained = outbox.drain();
        assert_eq!(drained.len(), MAX_QUEUED);
        assert_eq!(
            drained.last().unwrap(),
            &OutboundMessage::text(format!("msg-{}", MAX_QUEUED + 9))
        );
        assert_eq!(drained[0], OutboundMessage::text("msg-10"));
    }

    #[test]
    fn test_message_serialization_shape() {
        let json = serde_json::to_value(OutboundMessage::text("hi")).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["body"], "hi");
    }
}
