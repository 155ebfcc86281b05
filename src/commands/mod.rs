//! Chat commands routed by the session dispatcher.

mod group;
mod info;
mod media;
mod settings;

#[cfg(test)]
mod tests;

pub use media::MediaClient;
pub use settings::render_config;

use async_trait::async_trait;
use beacon_core::{
    error::BeaconError,
    message::OutgoingMessage,
    traits::{CommandHandler, Invocation, Socket},
};
use beacon_sessions::BotContext;
use std::sync::Arc;
use tracing::debug;

/// Known chat commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Alive,
    Menu,
    Ping,
    Uptime,
    TagAll,
    Repo,
    Config,
    Facebook,
    Song,
    YtAudio,
    GetPp,
}

impl Command {
    /// Parse a lower-cased command name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "alive" => Some(Self::Alive),
            "menu" | "help" => Some(Self::Menu),
            "ping" => Some(Self::Ping),
            "uptime" | "runtime" => Some(Self::Uptime),
            "tagall" => Some(Self::TagAll),
            "repo" | "sc" => Some(Self::Repo),
            "config" => Some(Self::Config),
            "fb" | "facebook" => Some(Self::Facebook),
            "song" | "play" => Some(Self::Song),
            "ytaudio" | "yta" => Some(Self::YtAudio),
            "getpp" => Some(Self::GetPp),
            _ => None,
        }
    }
}

/// Everything a command handler needs for one invocation.
pub struct CommandContext<'a> {
    pub bot: &'a BotContext,
    pub media: &'a MediaClient,
    pub socket: &'a Arc<dyn Socket>,
    pub invocation: &'a Invocation,
}

impl CommandContext<'_> {
    /// First argument, if any.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.invocation.args.get(index).map(String::as_str)
    }

    /// All arguments joined by spaces.
    pub fn rest(&self) -> String {
        self.invocation.args.join(" ")
    }

    /// `.cmd` as the user would type it.
    pub fn usage(&self, tail: &str) -> String {
        let prefix = &self.invocation.prefix;
        let name = &self.invocation.command;
        if tail.is_empty() {
            format!("{prefix}{name}")
        } else {
            format!("{prefix}{name} {tail}")
        }
    }

    /// Send a text reply quoting the command message.
    pub async fn reply(&self, text: impl Into<String>) -> Result<String, BeaconError> {
        let message = &self.invocation.message;
        self.socket
            .send(OutgoingMessage::text(&message.chat, text).quoting(&message.id))
            .await
    }

    /// Send an arbitrary message body into the command's chat, quoting it.
    pub async fn send(&self, outgoing: OutgoingMessage) -> Result<String, BeaconError> {
        self.socket
            .send(outgoing.quoting(&self.invocation.message.id))
            .await
    }
}

/// [`CommandHandler`] for the built-in command set.
pub struct CommandRegistry {
    bot: Arc<BotContext>,
    media: MediaClient,
}

impl CommandRegistry {
    pub fn new(bot: Arc<BotContext>, media: MediaClient) -> Self {
        Self { bot, media }
    }
}

#[async_trait]
impl CommandHandler for CommandRegistry {
    async fn handle(
        &self,
        socket: Arc<dyn Socket>,
        invocation: Invocation,
    ) -> Result<(), BeaconError> {
        let Some(command) = Command::parse(&invocation.command) else {
            debug!(number = %invocation.session, "ignoring unknown command {}", invocation.command);
            return Ok(());
        };
        let ctx = CommandContext {
            bot: &self.bot,
            media: &self.media,
            socket: &socket,
            invocation: &invocation,
        };
        match command {
            Command::Alive => info::handle_alive(&ctx).await,
            Command::Menu => info::handle_menu(&ctx).await,
            Command::Ping => info::handle_ping(&ctx).await,
            Command::Uptime => info::handle_uptime(&ctx).await,
            Command::Repo => info::handle_repo(&ctx).await,
            Command::TagAll => group::handle_tagall(&ctx).await,
            Command::GetPp => group::handle_getpp(&ctx).await,
            Command::Config => settings::handle_config(&ctx).await,
            Command::Facebook => media::handle_fb(&ctx).await,
            Command::Song => media::handle_song(&ctx).await,
            Command::YtAudio => media::handle_ytaudio(&ctx).await,
        }
    }
}
