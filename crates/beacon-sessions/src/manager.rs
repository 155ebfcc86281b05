//! Session lifecycle: start, supervise, reconnect and stop one socket per number.
//!
//! The registry lock is only held for map updates, never across network I/O.
//! Each entry carries a unique id so a late-finishing start or a stale
//! supervisor can tell it has been superseded and back off. Every connect
//! gets its own event channel, so nothing a replaced socket queued is read.

use beacon_core::{
    config::UserConfig,
    error::BeaconError,
    message::{normalize_number, user_jid, ConnectionEvent, InboundEvent, OutgoingMessage},
    traits::{CommandHandler, Credentials, SessionArchive, Socket, SocketFactory},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::archive::{cleanup_duplicates, latest_credentials, store_credentials};
use crate::context::BotContext;
use crate::dispatcher::{Dispatch, EventDispatcher};
use crate::retry::{retry, retry_all};

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Authenticating,
    Connected,
    Reconnecting,
    Terminated,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Initializing, Authenticating)
                | (Authenticating, Connected)
                | (Connected, Reconnecting)
                | (Reconnecting, Connected)
                | (_, Terminated)
        ) && self != Terminated
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Authenticating => "authenticating",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: Uuid,
    pub number: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    /// Per-number config as loaded when the session connected.
    pub config: UserConfig,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Return the existing session instead of failing with `AlreadyActive`.
    pub reuse: bool,
}

struct SessionEntry {
    id: Uuid,
    state: SessionState,
    created_at: DateTime<Utc>,
    config: UserConfig,
    socket: Option<Arc<dyn Socket>>,
    stop: watch::Sender<bool>,
}

impl SessionEntry {
    fn info(&self, number: &str) -> SessionInfo {
        SessionInfo {
            id: self.id,
            number: number.to_string(),
            state: self.state,
            created_at: self.created_at,
            config: self.config.clone(),
        }
    }
}

/// Owns every live session, keyed by normalized phone number.
pub struct SessionManager {
    factory: Arc<dyn SocketFactory>,
    archive: Option<Arc<dyn SessionArchive>>,
    context: Arc<BotContext>,
    commands: Arc<dyn CommandHandler>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn SocketFactory>,
        archive: Option<Arc<dyn SessionArchive>>,
        context: Arc<BotContext>,
        commands: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            factory,
            archive,
            context,
            commands,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.context
    }

    /// Start a session for `number`.
    ///
    /// Fails with `AlreadyActive` if one is live, unless `options.reuse` is
    /// set. Credentials come from the archive when one is configured; a
    /// number with no archived file starts unauthenticated (pairing).
    pub async fn start_session(
        self: &Arc<Self>,
        number: &str,
        options: StartOptions,
    ) -> Result<SessionInfo, BeaconError> {
        let number = normalize_number(number);
        if number.is_empty() {
            return Err(BeaconError::Config("phone number has no digits".into()));
        }

        let id = Uuid::new_v4();
        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let mut sessions = self.sessions.lock().await;
            if let Some(existing) = sessions.get(&number) {
                if options.reuse {
                    debug!(number = %number, "reusing live session");
                    return Ok(existing.info(&number));
                }
                return Err(BeaconError::AlreadyActive(number));
            }
            sessions.insert(
                number.clone(),
                SessionEntry {
                    id,
                    state: SessionState::Initializing,
                    created_at: Utc::now(),
                    config: UserConfig::default(),
                    socket: None,
                    stop: stop_tx,
                },
            );
        }

        info!(number = %number, "starting session");
        match self.establish(&number, id, stop_rx).await {
            Ok(info) => Ok(info),
            Err(e) => {
                self.remove_if_current(&number, id).await;
                error!(number = %number, "session start failed: {e}");
                Err(e)
            }
        }
    }

    /// Stop the session for `number`. Returns `false` if none was live.
    ///
    /// Pending event processing is cancelled. Status actions already
    /// scheduled are left to finish.
    pub async fn stop_session(&self, number: &str) -> bool {
        let number = normalize_number(number);
        let Some(entry) = self.sessions.lock().await.remove(&number) else {
            debug!(number = %number, "stop requested but no session is live");
            return false;
        };

        let _ = entry.stop.send(true);
        if let Some(socket) = entry.socket {
            close_socket(&number, socket.as_ref()).await;
        }
        info!(number = %number, "session stopped");
        true
    }

    pub async fn active_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.lock().await;
        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|(number, entry)| entry.info(number))
            .collect();
        infos.sort_by(|a, b| a.number.cmp(&b.number));
        infos
    }

    pub async fn session(&self, number: &str) -> Option<SessionInfo> {
        let number = normalize_number(number);
        self.sessions
            .lock()
            .await
            .get(&number)
            .map(|entry| entry.info(&number))
    }

    /// Start every number in turn. Failures are logged and reported, not fatal.
    pub async fn start_all(
        self: &Arc<Self>,
        numbers: &[String],
    ) -> Vec<(String, Result<SessionInfo, BeaconError>)> {
        let mut results = Vec::with_capacity(numbers.len());
        for number in numbers {
            let result = self
                .start_session(number, StartOptions { reuse: true })
                .await;
            if let Err(e) = &result {
                warn!(number = %number, "skipping: {e}");
            }
            results.push((number.clone(), result));
        }
        results
    }

    /// Stop every live session.
    pub async fn shutdown(&self) {
        let numbers: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for number in numbers {
            self.stop_session(&number).await;
        }
        info!("all sessions stopped");
    }

    async fn establish(
        self: &Arc<Self>,
        number: &str,
        id: Uuid,
        stop_rx: watch::Receiver<bool>,
    ) -> Result<SessionInfo, BeaconError> {
        self.transition(number, id, SessionState::Authenticating).await;
        let credentials = self.fetch_credentials(number).await?;
        if credentials.is_none() {
            info!(number = %number, "no archived credentials, pairing required");
        }

        let config = match self.context.configs.load(number).await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(number = %number, "config load failed, using defaults: {e}");
                UserConfig::default()
            }
        };

        let (tx, rx) = self.event_channel();
        let socket = self
            .factory
            .connect(number, credentials.as_ref(), tx)
            .await?;

        let registered = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(number) {
                Some(entry) if entry.id == id => {
                    entry.state = SessionState::Connected;
                    entry.socket = Some(socket.clone());
                    entry.config = config;
                    entry.created_at = Utc::now();
                    Some(entry.info(number))
                }
                _ => None,
            }
        };
        let Some(info) = registered else {
            close_socket(number, socket.as_ref()).await;
            return Err(BeaconError::PermanentDisconnect(format!(
                "session {number} was stopped while connecting"
            )));
        };
        info!(number = %number, "session connected");

        self.sync_archive(number, socket.as_ref(), credentials.as_ref())
            .await;
        self.notify_admins(number, socket.as_ref()).await;

        let manager = Arc::clone(self);
        let number = number.to_string();
        tokio::spawn(async move {
            manager.supervise(number, id, socket, rx, stop_rx).await;
        });
        Ok(info)
    }

    /// Fetch archived credentials with retries. Any read error uses up an
    /// attempt; exhaustion is an auth failure.
    async fn fetch_credentials(&self, number: &str) -> Result<Option<Credentials>, BeaconError> {
        let Some(archive) = self.archive.as_deref() else {
            return Ok(None);
        };
        retry_all(self.context.session_retry(), "credential fetch", move |_| {
            latest_credentials(archive, number)
        })
        .await
        .map_err(|e| BeaconError::AuthExpired(format!("{number}: {e}")))
    }

    /// Upload the socket's current credentials if they changed, then drop
    /// older archive files for this number. Best-effort.
    async fn sync_archive(&self, number: &str, socket: &dyn Socket, fetched: Option<&Credentials>) {
        let Some(archive) = self.archive.as_deref() else {
            return;
        };

        match socket.export_credentials().await {
            Ok(Some(data)) if fetched.map_or(true, |c| c.data != data) => {
                let created_at = Utc::now().timestamp_millis();
                if let Err(e) = store_credentials(archive, number, &data, created_at).await {
                    warn!(number = %number, "credential upload failed: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(number = %number, "credential export failed: {e}"),
        }

        if let Err(e) = cleanup_duplicates(archive, number).await {
            warn!(number = %number, "archive cleanup failed: {e}");
        }
    }

    async fn notify_admins(&self, number: &str, socket: &dyn Socket) {
        let admins = self.context.admins.numbers().await;
        if admins.is_empty() {
            return;
        }
        let text = format!(
            "✅ *{}* connected\n\n📞 Number: {number}\n🕒 Time: {}",
            self.context.bot.name,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        for admin in admins {
            let message = OutgoingMessage::text(user_jid(&admin), text.clone());
            if let Err(e) = socket.send(message).await {
                warn!(number = %number, "failed to notify admin {admin}: {e}");
            }
        }
    }

    fn event_channel(&self) -> (mpsc::Sender<InboundEvent>, mpsc::Receiver<InboundEvent>) {
        mpsc::channel(self.context.settings.event_buffer.max(1))
    }

    /// Drain the session's events until it is stopped or terminates.
    ///
    /// A closed event stream counts as a disconnect.
    async fn supervise(
        self: Arc<Self>,
        number: String,
        id: Uuid,
        mut socket: Arc<dyn Socket>,
        mut rx: mpsc::Receiver<InboundEvent>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let mut dispatcher =
            EventDispatcher::new(number.clone(), self.context.clone(), self.commands.clone());

        loop {
            let event = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                event = rx.recv() => event,
            };
            let connection = match event {
                Some(event) => match dispatcher.dispatch(&socket, event).await {
                    Dispatch::Connection(connection) => connection,
                    _ => continue,
                },
                None => ConnectionEvent::Disconnected {
                    reason: "event stream closed".into(),
                },
            };

            match connection {
                ConnectionEvent::Connected => {
                    debug!(number = %number, "socket reports connected");
                }
                ConnectionEvent::Disconnected { reason } => {
                    warn!(number = %number, "disconnected: {reason}");
                    close_socket(&number, socket.as_ref()).await;
                    match self.reconnect(&number, id, &mut stop_rx).await {
                        // The old receiver goes away here, and with it any
                        // events the dead socket queued after the drop.
                        Ok((fresh, fresh_rx)) => {
                            socket = fresh;
                            rx = fresh_rx;
                        }
                        Err(e) => {
                            error!(number = %number, "{e}");
                            self.terminate(&number, id).await;
                            return;
                        }
                    }
                }
                ConnectionEvent::LoggedOut => {
                    error!(number = %number, "logged out, session will not reconnect");
                    close_socket(&number, socket.as_ref()).await;
                    self.terminate(&number, id).await;
                    return;
                }
            }
        }
        debug!(number = %number, "event processing stopped");
    }

    /// Reconnect with linear backoff. Fails permanently on exhaustion, on a
    /// non-transient connect error, or when the session is stopped meanwhile.
    async fn reconnect(
        &self,
        number: &str,
        id: Uuid,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Result<(Arc<dyn Socket>, mpsc::Receiver<InboundEvent>), BeaconError> {
        let stopped = || BeaconError::PermanentDisconnect(format!("session {number} was stopped"));
        if !self.transition(number, id, SessionState::Reconnecting).await {
            return Err(stopped());
        }

        let policy = self.context.session_retry();
        let attempts = retry(policy, "reconnect", move |attempt| async move {
            info!(number = %number, "reconnect attempt {attempt}/{}", policy.max_attempts);
            let (tx, rx) = self.event_channel();
            let socket = self.factory.connect(number, None, tx).await?;
            Ok::<_, BeaconError>((socket, rx))
        });
        let (socket, rx) = tokio::select! {
            result = attempts => result.map_err(|e| {
                BeaconError::PermanentDisconnect(format!(
                    "{number}: reconnect failed after {} attempt(s): {e}",
                    policy.max_attempts
                ))
            })?,
            _ = stop_rx.changed() => return Err(stopped()),
        };

        let attached = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(number) {
                Some(entry) if entry.id == id => {
                    entry.state = SessionState::Connected;
                    entry.socket = Some(socket.clone());
                    true
                }
                _ => false,
            }
        };
        if !attached {
            close_socket(number, socket.as_ref()).await;
            return Err(stopped());
        }

        info!(number = %number, "reconnected");
        self.sync_archive(number, socket.as_ref(), None).await;
        Ok((socket, rx))
    }

    /// Move entry `id` to `next`. `false` when the entry is gone or superseded.
    async fn transition(&self, number: &str, id: Uuid, next: SessionState) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(number) {
            Some(entry) if entry.id == id => {
                if entry.state.can_transition_to(next) {
                    debug!(number = %number, "{} -> {next}", entry.state);
                    entry.state = next;
                } else {
                    warn!(number = %number, "ignoring transition {} -> {next}", entry.state);
                }
                true
            }
            _ => false,
        }
    }

    async fn terminate(&self, number: &str, id: Uuid) {
        if self.remove_if_current(number, id).await {
            info!(number = %number, "session terminated");
        }
    }

    async fn remove_if_current(&self, number: &str, id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(number).is_some_and(|entry| entry.id == id) {
            sessions.remove(number);
            true
        } else {
            false
        }
    }
}

async fn close_socket(number: &str, socket: &dyn Socket) {
    if let Err(e) = socket.close().await {
        warn!(number = %number, "socket close failed: {e}");
    }
}
