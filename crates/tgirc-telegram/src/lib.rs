//! Telegram adapter (teloxide).
//!
//! Implements the `tgirc-core` Telegram ports over the Bot API, and turns
//! incoming updates into [`tgirc_core::events::TelegramMessage`]s.

use async_trait::async_trait;

use teloxide::{net::Download, prelude::*, types::ParseMode};

use tokio::time::sleep;
use tracing::debug;

pub mod convert;
pub mod router;

use tgirc_core::{
    domain::ChatId,
    errors::Error,
    ports::{FileSource, TelegramPort},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(Bot::new(token))
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl TelegramPort for TelegramMessenger {
    async fn send_markdown(&self, chat: ChatId, markdown: &str, plain: &str) -> Result<()> {
        let sent = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat), markdown.to_string())
                    .parse_mode(ParseMode::Markdown)
            })
            .await;

        match sent {
            Ok(_) => Ok(()),
            // Unbalanced `*` or `_` makes Telegram reject the entities.
            Err(e) => {
                debug!(%chat, "markdown rejected, resending as plain text: {e}");
                self.send_plain(chat, plain).await
            }
        }
    }

    async fn send_plain(&self, chat: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(Self::tg_chat(chat), text.to_string()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FileSource for TelegramMessenger {
    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self
            .with_retry(|| self.bot.get_file(file_id.to_string()))
            .await?;

        let mut dst = Vec::new();
        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .map_err(|e| Error::External(format!("telegram download failed: {e}")))?;
        Ok(dst)
    }
}
