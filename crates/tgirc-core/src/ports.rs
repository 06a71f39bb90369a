//! Hexagonal ports for the external collaborators.
//!
//! The router only talks to these traits; `tgirc-irc`, `tgirc-telegram` and
//! `tgirc-mis` implement them.

use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Outbound side of the IRC connection.
///
/// Implementations serialize writes on their own connection.
#[async_trait]
pub trait IrcPort: Send + Sync {
    /// Send one `PRIVMSG` line to a channel.
    async fn privmsg(&self, channel: &str, text: &str) -> Result<()>;

    /// Send `QUIT` and close the connection.
    async fn quit(&self, message: &str) -> Result<()>;
}

/// Outbound side of the Telegram bot.
#[async_trait]
pub trait TelegramPort: Send + Sync {
    /// Send Markdown text, resending `plain` without formatting if Telegram
    /// rejects the Markdown.
    async fn send_markdown(&self, chat: ChatId, markdown: &str, plain: &str) -> Result<()>;

    async fn send_plain(&self, chat: ChatId, text: &str) -> Result<()>;
}

/// Downloads Telegram-hosted files by id.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Uploads images to a public host.
#[async_trait]
pub trait ImageRelay: Send + Sync {
    /// Returns the public URL, or `None` if anything went wrong.
    async fn upload(&self, data: Vec<u8>) -> Option<String>;
}
