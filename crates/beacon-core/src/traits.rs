use crate::{
    error::BeaconError,
    message::{ChatMessage, InboundEvent, OutgoingMessage, StatusUpdate},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One authenticated connection for a single phone number.
///
/// The socket adapter pushes everything it receives into the `mpsc` sender
/// handed to [`SocketFactory::connect`]; the socket itself is only used for
/// outbound traffic.
#[async_trait]
pub trait Socket: Send + Sync {
    /// Phone number this socket is logged in as.
    fn number(&self) -> &str;

    /// Send a message. Returns the platform message ID.
    async fn send(&self, message: OutgoingMessage) -> Result<String, BeaconError>;

    /// Send a read receipt for a status entry.
    async fn mark_status_viewed(&self, status: &StatusUpdate) -> Result<(), BeaconError>;

    /// React to a status entry with an emoji.
    async fn react_to_status(&self, status: &StatusUpdate, emoji: &str)
        -> Result<(), BeaconError>;

    /// Show the "recording audio" presence in a chat.
    async fn send_recording(&self, chat: &str) -> Result<(), BeaconError>;

    /// Participant JIDs of a group chat.
    async fn group_participants(&self, _group: &str) -> Result<Vec<String>, BeaconError> {
        Ok(Vec::new())
    }

    /// URL of a user's profile picture, if visible.
    async fn profile_picture_url(&self, _jid: &str) -> Result<Option<String>, BeaconError> {
        Ok(None)
    }

    /// Serialized credentials for archiving. `None` when the socket has none yet.
    async fn export_credentials(&self) -> Result<Option<Vec<u8>>, BeaconError> {
        Ok(None)
    }

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), BeaconError>;
}

/// Opens sockets. One call per (re)connect.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn connect(
        &self,
        number: &str,
        credentials: Option<&Credentials>,
        events: mpsc::Sender<InboundEvent>,
    ) -> Result<Arc<dyn Socket>, BeaconError>;
}

/// A file in the remote session archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// File name, e.g. `creds_94771234567_1718000000000.json`.
    pub name: String,
    /// Content reference used for deletes (git blob sha).
    pub sha: String,
}

/// Credential bundle fetched from (or destined for) the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub number: String,
    /// Epoch milliseconds embedded in the archive file name.
    pub created_at: i64,
    pub data: Vec<u8>,
}

/// Remote store of credential files.
#[async_trait]
pub trait SessionArchive: Send + Sync {
    /// Every entry under the archive prefix.
    async fn list(&self) -> Result<Vec<ArchiveEntry>, BeaconError>;

    /// Raw contents of one entry.
    async fn fetch(&self, entry: &ArchiveEntry) -> Result<Vec<u8>, BeaconError>;

    /// Create a new file.
    async fn upload(&self, name: &str, content: &[u8]) -> Result<(), BeaconError>;

    /// Delete by content reference.
    async fn delete(&self, entry: &ArchiveEntry) -> Result<(), BeaconError>;
}

/// A parsed command ready for execution.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Number of the session that received the message.
    pub session: String,
    /// Lower-cased command name without prefix.
    pub command: String,
    pub args: Vec<String>,
    /// Prefix in effect when the command was parsed.
    pub prefix: String,
    pub message: ChatMessage,
}

/// Executes commands routed by the dispatcher.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        socket: Arc<dyn Socket>,
        invocation: Invocation,
    ) -> Result<(), BeaconError>;
}
