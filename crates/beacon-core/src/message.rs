use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JID suffix for personal chats.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// JID of the status broadcast channel.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Build a personal chat JID from a bare phone number.
pub fn user_jid(number: &str) -> String {
    format!("{}@{USER_SERVER}", normalize_number(number))
}

/// Strip everything but digits from a phone number (`+94 77-123` -> `9477123`).
pub fn normalize_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Phone number of a JID (`94771:12@s.whatsapp.net` -> `94771`).
pub fn jid_number(jid: &str) -> String {
    let user = jid.split('@').next().unwrap_or_default();
    normalize_number(user.split(':').next().unwrap_or_default())
}

/// An event delivered by a socket into its session's inbound channel.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A contact posted to their status.
    Status(StatusUpdate),
    /// A chat (personal or group) message.
    Chat(ChatMessage),
    /// Connection lifecycle change.
    Connection(ConnectionEvent),
}

/// Connection lifecycle events emitted by the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    /// Unexpected drop. The manager may reconnect.
    Disconnected { reason: String },
    /// Session revoked from the phone. Never reconnected.
    LoggedOut,
}

/// A status broadcast entry from a contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Platform message ID of the status entry.
    pub id: String,
    /// JID of the contact who posted it.
    pub sender: String,
    pub timestamp: DateTime<Utc>,
}

/// An incoming chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform message ID.
    pub id: String,
    /// JID of the chat the message arrived in (reply target).
    pub chat: String,
    /// JID of the author.
    pub sender: String,
    /// Display name pushed by the sender's client.
    pub push_name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_from_me: bool,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

/// The text-bearing parts of a message, one slot per known sub-type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    pub conversation: Option<String>,
    pub extended_text: Option<String>,
    pub button_reply: Option<String>,
    pub image_caption: Option<String>,
    pub video_caption: Option<String>,
}

impl MessageContent {
    /// Plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            conversation: Some(text.into()),
            ..Default::default()
        }
    }

    /// Extract the command-bearing text. First non-empty slot wins, in order:
    /// plain text, extended text, button reply, image caption, video caption.
    pub fn extract_text(&self) -> Option<&str> {
        [
            &self.conversation,
            &self.extended_text,
            &self.button_reply,
            &self.image_caption,
            &self.video_caption,
        ]
        .into_iter()
        .filter_map(|slot| slot.as_deref())
        .find(|text| !text.is_empty())
    }
}

/// A message to send through a socket.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub id: Uuid,
    /// Target chat JID.
    pub chat: String,
    pub body: MessageBody,
    /// Message ID to quote, if any.
    pub quoted: Option<String>,
}

impl OutgoingMessage {
    /// Plain text reply.
    pub fn text(chat: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            chat,
            MessageBody::Text {
                text: text.into(),
                mentions: Vec::new(),
            },
        )
    }

    pub fn new(chat: impl Into<String>, body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat: chat.into(),
            body,
            quoted: None,
        }
    }

    /// Quote the given message ID.
    pub fn quoting(mut self, message_id: impl Into<String>) -> Self {
        self.quoted = Some(message_id.into());
        self
    }
}

/// Payload of an outgoing message.
#[derive(Debug, Clone)]
pub enum MessageBody {
    Text {
        text: String,
        /// JIDs mentioned in the text.
        mentions: Vec<String>,
    },
    Image {
        data: Vec<u8>,
        mimetype: String,
        caption: Option<String>,
    },
    Video {
        data: Vec<u8>,
        mimetype: String,
        caption: Option<String>,
    },
    Audio {
        data: Vec<u8>,
        mimetype: String,
    },
}

impl MessageBody {
    /// Text shown to the user, if any (text body or media caption).
    pub fn preview(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Image { caption, .. } | Self::Video { caption, .. } => caption.as_deref(),
            Self::Audio { .. } => None,
        }
    }
}
