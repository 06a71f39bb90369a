//! Operator console on stdin.

use std::sync::Arc;

use tgirc_core::bridge::Bridge;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Stop,
    Unknown(&'a str),
    Broadcast(&'a str),
    Empty,
}

pub fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    match line.strip_prefix('/') {
        Some(cmd) => match cmd.split_whitespace().next().unwrap_or_default() {
            "stop" => Command::Stop,
            _ => Command::Unknown(line),
        },
        None => Command::Broadcast(line),
    }
}

/// Read commands until `/stop`, end of input or `cancel`.
///
/// `/stop` cancels `stop_requested`; the caller owns the actual shutdown.
pub async fn run(bridge: Arc<Bridge>, stop_requested: CancellationToken, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
          _ = cancel.cancelled() => break,
          line = lines.next_line() => {
            let line = match line {
              Ok(Some(line)) => line,
              Ok(None) => {
                debug!("console input closed");
                break;
              }
              Err(e) => {
                warn!("console read failed: {e}");
                break;
              }
            };
            match parse(&line) {
              Command::Stop => {
                stop_requested.cancel();
                break;
              }
              Command::Unknown(cmd) => bridge.status(&format!("Unknown command: {cmd}")).await,
              Command::Broadcast(text) => bridge.broadcast(text).await,
              Command::Empty => {}
            }
          }
        }
    }
}
