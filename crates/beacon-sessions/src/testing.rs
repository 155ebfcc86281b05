//! In-memory fakes for the socket, factory, archive and command seams.

use async_trait::async_trait;
use beacon_core::{
    config::{AdminList, BotConfig, ConfigStore, SessionsConfig, UserConfig},
    error::BeaconError,
    message::{ChatMessage, InboundEvent, MessageContent, OutgoingMessage, StatusUpdate},
    traits::{
        ArchiveEntry, CommandHandler, Credentials, Invocation, SessionArchive, Socket,
        SocketFactory,
    },
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::context::BotContext;

static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh scratch directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "__beacon_sessions_{tag}_{}_{n}__",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Context with millisecond delays so retry loops finish quickly.
pub fn test_context(tag: &str) -> Arc<BotContext> {
    test_context_with_admins(tag, &[])
}

pub fn test_context_with_admins(tag: &str, admins: &[&str]) -> Arc<BotContext> {
    let dir = temp_dir(tag);
    if !admins.is_empty() {
        std::fs::write(dir.join("admins.json"), serde_json::to_string(admins).unwrap()).unwrap();
    }
    let settings = SessionsConfig {
        base_delay_ms: 5,
        ..Default::default()
    };
    Arc::new(BotContext::new(
        BotConfig::default(),
        ConfigStore::new(dir.join("config"), UserConfig::default(), Duration::from_secs(300)),
        AdminList::new(dir.join("admins.json"), Duration::from_secs(300)),
        settings,
    ))
}

pub fn status(sender: &str) -> InboundEvent {
    InboundEvent::Status(StatusUpdate {
        id: format!("status-{sender}"),
        sender: sender.to_string(),
        timestamp: Utc::now(),
    })
}

pub fn chat(sender: &str, text: &str) -> InboundEvent {
    InboundEvent::Chat(chat_message(sender, MessageContent::text(text)))
}

pub fn chat_message(sender: &str, content: MessageContent) -> ChatMessage {
    ChatMessage {
        id: "msg-1".into(),
        chat: sender.to_string(),
        sender: sender.to_string(),
        push_name: None,
        is_group: false,
        is_from_me: false,
        content,
        timestamp: Utc::now(),
    }
}

/// Socket that records every outbound call.
pub struct FakeSocket {
    number: String,
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub viewed: AtomicU32,
    pub reactions: Mutex<Vec<String>>,
    pub recordings: AtomicU32,
    /// Upcoming reaction calls that fail with a transient error.
    pub failing_reactions: AtomicU32,
    pub closed: AtomicBool,
    /// `close` reports an error (after marking the socket closed).
    pub fail_close: AtomicBool,
    pub credentials: Option<Vec<u8>>,
}

impl FakeSocket {
    pub fn new(number: &str) -> Self {
        Self {
            number: number.to_string(),
            sent: Mutex::new(Vec::new()),
            viewed: AtomicU32::new(0),
            reactions: Mutex::new(Vec::new()),
            recordings: AtomicU32::new(0),
            failing_reactions: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            credentials: None,
        }
    }

    pub fn reaction_count(&self) -> usize {
        self.reactions.lock().unwrap().len()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Socket for FakeSocket {
    fn number(&self) -> &str {
        &self.number
    }

    async fn send(&self, message: OutgoingMessage) -> Result<String, BeaconError> {
        let id = message.id.to_string();
        self.sent.lock().unwrap().push(message);
        Ok(id)
    }

    async fn mark_status_viewed(&self, _status: &StatusUpdate) -> Result<(), BeaconError> {
        self.viewed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn react_to_status(
        &self,
        _status: &StatusUpdate,
        emoji: &str,
    ) -> Result<(), BeaconError> {
        let pending = self.failing_reactions.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_reactions.store(pending - 1, Ordering::SeqCst);
            return Err(BeaconError::TransientNetwork("reaction dropped".into()));
        }
        self.reactions.lock().unwrap().push(emoji.to_string());
        Ok(())
    }

    async fn send_recording(&self, _chat: &str) -> Result<(), BeaconError> {
        self.recordings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn export_credentials(&self) -> Result<Option<Vec<u8>>, BeaconError> {
        Ok(self.credentials.clone())
    }

    async fn close(&self) -> Result<(), BeaconError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(BeaconError::Channel("socket already torn down".into()));
        }
        Ok(())
    }
}

/// Factory handing out [`FakeSocket`]s and keeping their event senders.
#[derive(Default)]
pub struct FakeFactory {
    pub connects: AtomicU32,
    /// Upcoming connects that fail with a transient error.
    pub failing_connects: AtomicU32,
    /// Every connect fails with a non-transient error when set.
    pub reject_all: AtomicBool,
    pub connect_delay: Duration,
    pub exported: Option<Vec<u8>>,
    pub sockets: Mutex<Vec<Arc<FakeSocket>>>,
    pub senders: Mutex<Vec<mpsc::Sender<InboundEvent>>>,
    pub seen_credentials: Mutex<Vec<Option<Credentials>>>,
}

impl FakeFactory {
    pub fn last_socket(&self) -> Option<Arc<FakeSocket>> {
        self.sockets.lock().unwrap().last().cloned()
    }

    pub fn last_sender(&self) -> Option<mpsc::Sender<InboundEvent>> {
        self.senders.lock().unwrap().last().cloned()
    }

    /// Sockets for `number` that were never closed.
    pub fn open_sockets(&self, number: &str) -> usize {
        self.sockets
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.number() == number && !s.is_closed())
            .count()
    }
}

#[async_trait]
impl SocketFactory for FakeFactory {
    async fn connect(
        &self,
        number: &str,
        credentials: Option<&Credentials>,
        events: mpsc::Sender<InboundEvent>,
    ) -> Result<Arc<dyn Socket>, BeaconError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials
            .lock()
            .unwrap()
            .push(credentials.cloned());
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(BeaconError::AuthExpired(format!("{number} logged out")));
        }
        let pending = self.failing_connects.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_connects.store(pending - 1, Ordering::SeqCst);
            return Err(BeaconError::TransientNetwork("connection refused".into()));
        }

        let mut socket = FakeSocket::new(number);
        socket.credentials = self.exported.clone();
        let socket = Arc::new(socket);
        self.sockets.lock().unwrap().push(socket.clone());
        self.senders.lock().unwrap().push(events);
        Ok(socket)
    }
}

/// Archive kept in a map, with sha = "sha-<name>".
#[derive(Default)]
pub struct MemoryArchive {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Upcoming list calls that fail with a transient error.
    pub failing_lists: AtomicU32,
    /// Upcoming fetch calls that fail with a non-transient error.
    pub failing_fetches: AtomicU32,
    pub deleted: Mutex<Vec<String>>,
}

impl MemoryArchive {
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        let archive = Self::default();
        {
            let mut map = archive.files.lock().unwrap();
            for (name, data) in files {
                map.insert(name.to_string(), data.to_vec());
            }
        }
        archive
    }

    pub fn names(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl SessionArchive for MemoryArchive {
    async fn list(&self) -> Result<Vec<ArchiveEntry>, BeaconError> {
        let pending = self.failing_lists.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_lists.store(pending - 1, Ordering::SeqCst);
            return Err(BeaconError::TransientNetwork("archive unavailable".into()));
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .map(|name| ArchiveEntry {
                name: name.clone(),
                sha: format!("sha-{name}"),
            })
            .collect())
    }

    async fn fetch(&self, entry: &ArchiveEntry) -> Result<Vec<u8>, BeaconError> {
        let pending = self.failing_fetches.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_fetches.store(pending - 1, Ordering::SeqCst);
            return Err(BeaconError::Config(format!("{} is not valid", entry.name)));
        }
        self.files
            .lock()
            .unwrap()
            .get(&entry.name)
            .cloned()
            .ok_or_else(|| BeaconError::Archive(format!("{} not found", entry.name)))
    }

    async fn upload(&self, name: &str, content: &[u8]) -> Result<(), BeaconError> {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
        Ok(())
    }

    async fn delete(&self, entry: &ArchiveEntry) -> Result<(), BeaconError> {
        self.files.lock().unwrap().remove(&entry.name);
        self.deleted.lock().unwrap().push(entry.name.clone());
        Ok(())
    }
}

/// Command handler that records invocations and optionally fails.
#[derive(Default)]
pub struct RecordingHandler {
    pub calls: Mutex<Vec<Invocation>>,
    pub fail: AtomicBool,
}

impl RecordingHandler {
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|inv| inv.command.clone())
            .collect()
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle(
        &self,
        _socket: Arc<dyn Socket>,
        invocation: Invocation,
    ) -> Result<(), BeaconError> {
        self.calls.lock().unwrap().push(invocation);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BeaconError::Command("boom".into()));
        }
        Ok(())
    }
}
