//! Platform-neutral classification of received messages.

use beacon_core::message::{ChatMessage, InboundEvent, MessageContent, StatusUpdate, STATUS_BROADCAST};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

/// A received message after protocol unwrapping.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub chat: String,
    pub sender: String,
    pub push_name: Option<String>,
    pub is_from_me: bool,
    pub is_group: bool,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

/// Turn a received message into the event the session consumes.
///
/// Posts to the status broadcast chat become status updates, except our
/// own. Everything else is a chat message.
pub fn classify(raw: RawMessage) -> Option<InboundEvent> {
    if raw.chat == STATUS_BROADCAST {
        if raw.is_from_me {
            return None;
        }
        return Some(InboundEvent::Status(StatusUpdate {
            id: raw.id,
            sender: raw.sender,
            timestamp: raw.timestamp,
        }));
    }

    Some(InboundEvent::Chat(ChatMessage {
        id: raw.id,
        chat: raw.chat,
        sender: raw.sender,
        push_name: raw.push_name.filter(|n| !n.is_empty()),
        is_group: raw.is_group,
        is_from_me: raw.is_from_me,
        content: raw.content,
        timestamp: raw.timestamp,
    }))
}

/// IDs of messages this socket sent, so their echoes are not re-processed.
///
/// Holds at most `capacity` IDs; the oldest are forgotten first.
#[derive(Debug)]
pub struct EchoFilter {
    capacity: usize,
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl EchoFilter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn remember(&mut self, id: String) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
    }

    /// `true` (and forget it) if `id` was sent by us.
    pub fn take(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            self.order.retain(|known| known != id);
            true
        } else {
            false
        }
    }
}
