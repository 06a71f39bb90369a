//! IRC adapter: a single plain or TLS connection to one server.
//!
//! Inbound lines are parsed on a reader task and handed to the bridge as
//! [`IrcEvent`]s. Outbound writes go through one mutex-guarded writer, so
//! lines from concurrent senders never interleave.

pub mod proto;

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tgirc_core::{
    config::IrcConfig,
    errors::Error,
    events::{IrcEvent, IrcLine, IrcLineKind},
    ports::IrcPort,
    Result,
};
use tokio::{
    io::{
        AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf,
    },
    net::TcpStream,
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_rustls::{
    rustls::{pki_types::ServerName, ClientConfig, RootCertStore},
    TlsConnector,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::proto::{Ctcp, Message};

const DEFAULT_PORT: u16 = 6667;
const DEFAULT_TLS_PORT: u16 = 6697;
const EVENT_QUEUE: usize = 256;
/// Longest inbound line: 8191 bytes of IRCv3 tags plus a 512-byte message.
pub const MAX_LINE_BYTES: usize = 8191 + 512;
const VERSION_REPLY: &str = concat!("tgirc ", env!("CARGO_PKG_VERSION"));

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

type Writer = WriteHalf<Box<dyn Transport>>;

#[derive(Clone)]
pub struct IrcClient {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: IrcConfig,
    channels: Vec<String>,
    writer: Mutex<Option<Writer>>,
    /// Current nick; changes if the configured one is taken.
    nick: StdMutex<String>,
}

impl IrcClient {
    pub fn new(cfg: IrcConfig, channels: Vec<String>) -> Self {
        let nick = cfg.nick.clone();
        Self {
            inner: Arc::new(Inner {
                cfg,
                channels,
                writer: Mutex::new(None),
                nick: StdMutex::new(nick),
            }),
        }
    }

    /// Connect, register and start reading.
    ///
    /// The returned receiver yields events until the connection closes or
    /// `cancel` fires; the task handle finishes at the same point.
    pub async fn connect(
        &self,
        cancel: CancellationToken,
    ) -> Result<(mpsc::Receiver<IrcEvent>, JoinHandle<()>)> {
        let (host, port) = split_address(&self.inner.cfg.address, self.inner.cfg.tls)?;
        info!(%host, port, tls = self.inner.cfg.tls, "connecting to IRC");

        let tcp = TcpStream::connect((host, port)).await?;
        let stream: Box<dyn Transport> = if self.inner.cfg.tls {
            Box::new(tls_connect(host, tcp).await?)
        } else {
            Box::new(tcp)
        };
        self.start(stream, cancel).await
    }

    async fn start(
        &self,
        stream: Box<dyn Transport>,
        cancel: CancellationToken,
    ) -> Result<(mpsc::Receiver<IrcEvent>, JoinHandle<()>)> {
        let (reader, writer) = tokio::io::split(stream);
        *self.inner.writer.lock().await = Some(writer);

        let nick = self.current_nick();
        self.send_raw(&proto::nick(&nick)).await?;
        self.send_raw(&proto::user(&self.inner.cfg.user, &self.inner.cfg.user))
            .await?;

        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let client = self.clone();
        let task = tokio::spawn(async move {
            client.read_loop(reader, tx, cancel).await;
        });
        Ok((rx, task))
    }

    fn current_nick(&self) -> String {
        self.inner
            .nick
            .lock()
            .map(|n| n.clone())
            .unwrap_or_else(|_| self.inner.cfg.nick.clone())
    }

    async fn send_raw(&self, line: &str) -> Result<()> {
        let mut guard = self.inner.writer.lock().await;
        let w = guard
            .as_mut()
            .ok_or_else(|| Error::Transport("IRC connection is closed".to_string()))?;
        w.write_all(line.as_bytes()).await?;
        w.flush().await?;
        Ok(())
    }

    async fn read_loop(
        &self,
        reader: tokio::io::ReadHalf<Box<dyn Transport>>,
        tx: mpsc::Sender<IrcEvent>,
        cancel: CancellationToken,
    ) {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(512);
        // Set while skipping the rest of an over-long line.
        let mut discarding = false;
        loop {
            buf.clear();
            let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
            tokio::select! {
              _ = cancel.cancelled() => {
                debug!("IRC reader cancelled");
                break;
              }
              n = limited.read_until(b'\n', &mut buf) => {
                match n {
                  Ok(0) => {
                    info!("IRC server closed the connection");
                    break;
                  }
                  Ok(_) => {}
                  Err(e) => {
                    warn!("IRC read failed: {e}");
                    break;
                  }
                }
                let complete = buf.last() == Some(&b'\n');
                if discarding {
                  discarding = !complete;
                  continue;
                }
                if !complete && buf.len() >= MAX_LINE_BYTES {
                  warn!(limit = MAX_LINE_BYTES, "discarding over-long IRC line");
                  discarding = true;
                  continue;
                }
                let line = String::from_utf8_lossy(&buf);
                let Some(msg) = Message::parse(&line) else { continue; };
                if let Err(e) = self.handle(msg, &tx).await {
                  warn!("IRC connection lost: {e}");
                  break;
                }
                if tx.is_closed() {
                  break;
                }
              }
            }
        }
        self.inner.writer.lock().await.take();
    }

    async fn handle(&self, msg: Message, tx: &mpsc::Sender<IrcEvent>) -> Result<()> {
        match msg.command.as_str() {
            "PING" => {
                let token = msg.param(0).unwrap_or_default();
                self.send_raw(&proto::pong(token)).await?;
            }
            "001" => {
                for channel in &self.inner.channels {
                    self.send_raw(&proto::join(channel)).await?;
                }
                if !self.inner.cfg.password.is_empty() {
                    let identify = format!("IDENTIFY {}", self.inner.cfg.password);
                    self.send_raw(&proto::privmsg("NickServ", &identify)).await?;
                }
                let _ = tx.send(IrcEvent::Registered).await;
            }
            "433" => {
                let next = {
                    let mut nick = self
                        .inner
                        .nick
                        .lock()
                        .map_err(|_| Error::External("nick lock poisoned".to_string()))?;
                    nick.push('_');
                    nick.clone()
                };
                warn!(%next, "nick in use, retrying");
                self.send_raw(&proto::nick(&next)).await?;
            }
            "PRIVMSG" => {
                let (Some(nick), Some(target), Some(body)) = (msg.nick(), msg.param(0), msg.param(1))
                else {
                    return Ok(());
                };
                let (kind, text) = match proto::parse_ctcp(body) {
                    None => (IrcLineKind::Message, body),
                    Some(Ctcp::Action(text)) => (IrcLineKind::Action, text),
                    Some(Ctcp::Version) => {
                        let reply = format!("{c}VERSION {VERSION_REPLY}{c}", c = proto::CTCP);
                        self.send_raw(&proto::notice(nick, &reply)).await?;
                        return Ok(());
                    }
                    Some(Ctcp::Other(verb)) => {
                        debug!(%nick, verb, "ignoring CTCP request");
                        return Ok(());
                    }
                };
                let line = IrcLine {
                    channel: target.to_string(),
                    nick: nick.to_string(),
                    text: text.to_string(),
                    kind,
                };
                let _ = tx.send(IrcEvent::Line(line)).await;
            }
            "ERROR" => warn!("IRC server error: {}", msg.param(0).unwrap_or_default()),
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl IrcPort for IrcClient {
    async fn privmsg(&self, channel: &str, text: &str) -> Result<()> {
        self.send_raw(&proto::privmsg(channel, text)).await
    }

    async fn quit(&self, message: &str) -> Result<()> {
        let mut guard = self.inner.writer.lock().await;
        let Some(mut w) = guard.take() else {
            return Ok(());
        };
        w.write_all(proto::quit(message).as_bytes()).await?;
        w.flush().await?;
        w.shutdown().await?;
        Ok(())
    }
}

/// `host:port`, `host` (default port) or `[v6]:port`.
fn split_address(address: &str, tls: bool) -> Result<(&str, u16)> {
    let default_port = if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT };
    let address = address.trim();
    if address.is_empty() {
        return Err(Error::Config("IRC address is empty".to_string()));
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("invalid IRC address {address:?}")))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, parse_port(address, port)?)),
            None => Ok((host, default_port)),
        };
    }

    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Ok((host, parse_port(address, port)?)),
        _ => Ok((address, default_port)),
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| Error::Config(format!("invalid port in IRC address {address:?}")))
}

async fn tls_connect(
    host: &str,
    tcp: TcpStream,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Config(format!("invalid IRC host name {host:?}: {e}")))?;
    let stream = TlsConnector::from(Arc::new(config))
        .connect(server_name, tcp)
        .await?;
    Ok(stream)
}
