//! Per-session event routing: status auto-actions and prefixed commands.

use beacon_core::{
    config::UserConfig,
    message::{ChatMessage, ConnectionEvent, InboundEvent, OutgoingMessage, StatusUpdate},
    traits::{CommandHandler, Invocation, Socket},
};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::context::BotContext;
use crate::cooldown::{CommandCooldown, StatusThrottle};
use crate::retry::{retry, RetryPolicy};

/// Reply sent when a command handler fails unexpectedly.
const COMMAND_FAILED: &str = "❌ Something went wrong while running that command.";

/// What the dispatcher did with an event.
#[derive(Debug)]
pub enum Dispatch {
    /// Status actions are running; the handle resolves to their outcome.
    StatusScheduled(JoinHandle<StatusReport>),
    /// Another status fired within the cooldown window.
    StatusThrottled,
    /// Every status action is switched off for this number.
    StatusDisabled,
    /// A command was handed to the registry.
    Command {
        name: String,
        handle: JoinHandle<()>,
    },
    Dropped(DropReason),
    /// Lifecycle events are left to the session supervisor.
    Connection(ConnectionEvent),
}

/// Why a chat message was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoText,
    NoPrefix,
    EmptyCommand,
    Cooldown,
}

/// Outcome of one batch of status actions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub viewed: bool,
    /// Emoji reacted with, when the reaction went through.
    pub reaction: Option<String>,
    pub recorded: bool,
    /// Actions that exhausted their retries.
    pub failures: Vec<String>,
}

/// Split prefixed text into a lower-cased command and its arguments.
/// The prefix must be the very first thing in `text`.
pub fn parse_command(text: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    let body = text.strip_prefix(prefix)?;
    let mut tokens = body.split_whitespace();
    let command = tokens.next()?.to_lowercase();
    Some((command, tokens.map(str::to_string).collect()))
}

/// Consumes one session's events in arrival order.
pub struct EventDispatcher {
    number: String,
    context: Arc<BotContext>,
    commands: Arc<dyn CommandHandler>,
    status_throttle: StatusThrottle,
    cooldown: CommandCooldown,
}

impl EventDispatcher {
    pub fn new(
        number: impl Into<String>,
        context: Arc<BotContext>,
        commands: Arc<dyn CommandHandler>,
    ) -> Self {
        let settings = &context.settings;
        let status_throttle = StatusThrottle::new(settings.status_cooldown());
        let cooldown = CommandCooldown::new(settings.command_cooldown(), settings.cooldown_capacity);
        Self {
            number: number.into(),
            context,
            commands,
            status_throttle,
            cooldown,
        }
    }

    pub async fn dispatch(&mut self, socket: &Arc<dyn Socket>, event: InboundEvent) -> Dispatch {
        self.dispatch_at(socket, event, Instant::now()).await
    }

    /// Same as [`dispatch`](Self::dispatch) with an explicit clock.
    pub async fn dispatch_at(
        &mut self,
        socket: &Arc<dyn Socket>,
        event: InboundEvent,
        now: Instant,
    ) -> Dispatch {
        match event {
            InboundEvent::Status(status) => self.on_status(socket, status, now).await,
            InboundEvent::Chat(message) => self.on_chat(socket, message, now).await,
            InboundEvent::Connection(conn) => Dispatch::Connection(conn),
        }
    }

    async fn user_config(&self) -> UserConfig {
        match self.context.configs.load(&self.number).await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(number = %self.number, "config load failed, using defaults: {e}");
                UserConfig::default()
            }
        }
    }

    async fn on_status(
        &mut self,
        socket: &Arc<dyn Socket>,
        status: StatusUpdate,
        now: Instant,
    ) -> Dispatch {
        let config = self.user_config().await;
        if !(config.auto_view_status || config.auto_like_status || config.auto_recording) {
            return Dispatch::StatusDisabled;
        }
        if !self.status_throttle.try_acquire(now) {
            debug!(number = %self.number, "status from {} throttled", status.sender);
            return Dispatch::StatusThrottled;
        }

        let emoji = if config.auto_like_status {
            config.like_emojis.choose(&mut rand::thread_rng()).cloned()
        } else {
            None
        };
        let policy = self.context.action_retry(config.max_retries);
        let actions = StatusActions {
            number: self.number.clone(),
            socket: socket.clone(),
            status,
            policy,
            view: config.auto_view_status,
            emoji,
            record: config.auto_recording,
        };
        Dispatch::StatusScheduled(tokio::spawn(actions.run()))
    }

    async fn on_chat(
        &mut self,
        socket: &Arc<dyn Socket>,
        message: ChatMessage,
        now: Instant,
    ) -> Dispatch {
        let Some(text) = message.content.extract_text() else {
            return Dispatch::Dropped(DropReason::NoText);
        };
        let config = self.user_config().await;
        if !text.starts_with(&config.prefix) {
            return Dispatch::Dropped(DropReason::NoPrefix);
        }
        let Some((command, args)) = parse_command(text, &config.prefix) else {
            return Dispatch::Dropped(DropReason::EmptyCommand);
        };
        if !self.cooldown.check(&message.sender, now) {
            debug!(number = %self.number, "command from {} on cooldown", message.sender);
            return Dispatch::Dropped(DropReason::Cooldown);
        }

        debug!(number = %self.number, "dispatching {command} from {}", message.sender);
        let invocation = Invocation {
            session: self.number.clone(),
            command: command.clone(),
            args,
            prefix: config.prefix.clone(),
            message,
        };
        let handler = self.commands.clone();
        let socket = socket.clone();
        let number = self.number.clone();
        let handle = tokio::spawn(async move {
            let chat = invocation.message.chat.clone();
            let message_id = invocation.message.id.clone();
            let name = invocation.command.clone();
            if let Err(e) = handler.handle(socket.clone(), invocation).await {
                error!(number = %number, "command {name} failed: {e}");
                let notice = OutgoingMessage::text(chat, COMMAND_FAILED).quoting(message_id);
                if let Err(e) = socket.send(notice).await {
                    warn!(number = %number, "failed to send failure notice: {e}");
                }
            }
        });
        Dispatch::Command {
            name: command,
            handle,
        }
    }
}

/// One batch of status actions, each retried independently.
struct StatusActions {
    number: String,
    socket: Arc<dyn Socket>,
    status: StatusUpdate,
    policy: RetryPolicy,
    view: bool,
    emoji: Option<String>,
    record: bool,
}

impl StatusActions {
    async fn run(self) -> StatusReport {
        let mut report = StatusReport::default();
        let socket = self.socket.as_ref();
        let status = &self.status;

        if self.view {
            match retry(self.policy, "mark status viewed", move |_| {
                socket.mark_status_viewed(status)
            })
            .await
            {
                Ok(()) => report.viewed = true,
                Err(e) => self.fail(&mut report, "view", e),
            }
        }

        if let Some(emoji) = self.emoji.as_deref() {
            match retry(self.policy, "status reaction", move |_| {
                socket.react_to_status(status, emoji)
            })
            .await
            {
                Ok(()) => report.reaction = Some(emoji.to_string()),
                Err(e) => self.fail(&mut report, "react", e),
            }
        }

        if self.record {
            let sender = status.sender.as_str();
            match retry(self.policy, "recording presence", move |_| {
                socket.send_recording(sender)
            })
            .await
            {
                Ok(()) => report.recorded = true,
                Err(e) => self.fail(&mut report, "record", e),
            }
        }

        report
    }

    fn fail(&self, report: &mut StatusReport, action: &str, e: beacon_core::error::BeaconError) {
        error!(
            number = %self.number,
            "status {action} for {} gave up: {e}",
            self.status.sender
        );
        report.failures.push(action.to_string());
    }
}
