use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tgirc_core::events::TelegramMessage;

use crate::convert;

/// Check the token with `getMe`, returning the bot's username.
pub async fn check_connection(bot: &Bot) -> anyhow::Result<String> {
    let me = bot.get_me().await?;
    Ok(me.username().to_string())
}

/// Long-poll for updates, forwarding every message to `tx`.
///
/// Returns when `cancel` fires or the receiving side goes away.
pub async fn run_polling(bot: Bot, tx: mpsc::Sender<TelegramMessage>, cancel: CancellationToken) {
    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![tx.clone()])
        .build();

    info!("Telegram polling started");
    tokio::select! {
      _ = dispatcher.dispatch() => {}
      _ = cancel.cancelled() => debug!("Telegram polling cancelled"),
      _ = tx.closed() => debug!("Telegram event receiver dropped"),
    }
    info!("Telegram polling stopped");
}

async fn handle_message(msg: Message, tx: mpsc::Sender<TelegramMessage>) -> ResponseResult<()> {
    for event in convert::to_events(&msg) {
        if tx.send(event).await.is_err() {
            break;
        }
    }
    Ok(())
}
