//! Bridge router: turns inbound events into audit records and outbound
//! messages for the other network.
//!
//! Routing itself ([`route_irc`], [`route_telegram`]) is pure; [`Bridge`] adds
//! the I/O around it: media relay, record submission and delivery.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::{
    config::MAX_IN_FLIGHT_LIMIT,
    context::AppContext,
    domain::{Destination, OutboundMessage},
    events::{
        Attachment, IrcEvent, IrcLine, IrcLineKind, Origin, ServiceEvent, TelegramMessage,
        TelegramUser,
    },
    formatting,
    mapping::ChannelMapping,
    record::{LogRecord, RecordBuilder, Tag},
    split::split,
};

/// One routed event: exactly one audit record, plus zero or more sends.
#[derive(Clone, Debug, PartialEq)]
pub struct Routed {
    pub record: LogRecord,
    pub outbound: Vec<OutboundMessage>,
}

impl Routed {
    fn record_only(record: LogRecord) -> Self {
        Self {
            record,
            outbound: Vec::new(),
        }
    }
}

/// Route an IRC line to its Telegram chat.
pub fn route_irc(mapping: &ChannelMapping, line: &IrcLine, now: i64) -> Routed {
    let Some(chat) = mapping.telegram_for(&line.channel) else {
        return Routed::record_only(irc_record(Tag::UnmappedIrc, line, now));
    };

    let (tag, markdown, plain) = match line.kind {
        IrcLineKind::Message => (
            Tag::IrcMessage,
            formatting::irc_message_markdown(&line.nick, &line.text),
            formatting::irc_message_plain(&line.nick, &line.text),
        ),
        IrcLineKind::Action => (
            Tag::IrcAction,
            formatting::irc_action_markdown(&line.nick, &line.text),
            formatting::irc_action_plain(&line.nick, &line.text),
        ),
    };

    Routed {
        record: irc_record(tag, line, now),
        outbound: vec![OutboundMessage::telegram(chat, markdown, plain)],
    }
}

fn irc_record(tag: Tag, line: &IrcLine, now: i64) -> LogRecord {
    LogRecord::builder(tag)
        .field(now)
        .field(&line.channel)
        .field(&line.nick)
        .field(&line.text)
        .finish()
}

/// Route a Telegram message to its IRC channel.
///
/// Media relay has already happened: a relayed image URL is part of `msg.text`.
pub fn route_telegram(mapping: &ChannelMapping, msg: &TelegramMessage) -> Routed {
    let Some(channel) = mapping.irc_for(msg.chat) else {
        let text = if msg.text.is_empty() {
            &msg.caption
        } else {
            &msg.text
        };
        return Routed::record_only(
            telegram_base(Tag::UnmappedTelegram, msg, &msg.sender)
                .field(text)
                .finish(),
        );
    };

    let text = rendered_text(msg);
    if text.is_empty() {
        return route_data(channel, msg);
    }

    let (record, irc_text) = match &msg.origin {
        Some(Origin::Forward { sender, timestamp }) => (
            telegram_base(Tag::Forward, msg, &msg.sender)
                .field(&text)
                .group()
                .field(timestamp)
                .field(&sender.username)
                .field(sender.id.0)
                .finish(),
            formatting::forwarded(&text, &sender.username),
        ),
        Some(Origin::Reply {
            id,
            timestamp,
            sender,
            text: reply_text,
        }) => (
            telegram_base(Tag::Reply, msg, &msg.sender)
                .field(&text)
                .group()
                .field(id.0)
                .field(timestamp)
                .field(&sender.username)
                .field(sender.id.0)
                .field(reply_text)
                .finish(),
            formatting::reply(&text, &sender.username),
        ),
        None => {
            let tag = match msg.attachment {
                Some(Attachment::Location { .. }) => Tag::Location,
                Some(Attachment::Contact { .. }) => Tag::Contact,
                _ => Tag::Message,
            };
            (
                telegram_base(tag, msg, &msg.sender).field(&text).finish(),
                text.clone(),
            )
        }
    };

    Routed {
        record,
        outbound: irc_lines(channel, &msg.sender.username, &irc_text),
    }
}

/// Messages without text: logged, and only membership changes reach IRC.
///
/// A caption on unrelayed media is kept in the record, not sent.
fn route_data(channel: &str, msg: &TelegramMessage) -> Routed {
    let placeholder = match (&msg.attachment, &msg.service) {
        (Some(Attachment::Audio), _) => "DATA_AUDIO".to_string(),
        (Some(Attachment::Video), _) => "DATA_VIDEO".to_string(),
        (Some(Attachment::Photo { .. }), _) => "DATA_PHOTO".to_string(),
        (Some(Attachment::Sticker { .. }), _) => "DATA_STICKER".to_string(),
        (_, Some(ServiceEvent::Joined(member))) => {
            return membership(Tag::Join, channel, msg, member, "* joined the group");
        }
        (_, Some(ServiceEvent::Left(member))) => {
            return membership(Tag::Leave, channel, msg, member, "* left the group");
        }
        (_, Some(ServiceEvent::TitleChanged(title))) => format!("Group title changed to {title}"),
        (Some(Attachment::Document { mime, .. }), _) => format!("DATA_DOCUMENT-{mime}"),
        _ => "DATA_UNKNOWN".to_string(),
    };

    let mut record = telegram_base(Tag::Data, msg, &msg.sender).field(placeholder);
    if !msg.caption.is_empty() {
        record = record.group().field(&msg.caption);
    }
    Routed::record_only(record.finish())
}

fn membership(
    tag: Tag,
    channel: &str,
    msg: &TelegramMessage,
    member: &TelegramUser,
    notice: &str,
) -> Routed {
    Routed {
        record: telegram_base(tag, msg, member).finish(),
        outbound: vec![OutboundMessage::irc(
            channel,
            formatting::telegram_line(&member.username, notice),
        )],
    }
}

/// `id|timestamp|chat|username|uid`
fn telegram_base(tag: Tag, msg: &TelegramMessage, user: &TelegramUser) -> RecordBuilder {
    LogRecord::builder(tag)
        .field(msg.id.0)
        .field(msg.timestamp)
        .field(msg.chat)
        .field(&user.username)
        .field(user.id.0)
}

/// Text as it should appear on IRC; locations and contacts are rendered.
fn rendered_text(msg: &TelegramMessage) -> String {
    match &msg.attachment {
        Some(Attachment::Location {
            latitude,
            longitude,
        }) => formatting::location_url(*latitude, *longitude),
        Some(Attachment::Contact {
            first_name,
            last_name,
            phone,
        }) => formatting::contact(first_name, last_name, phone),
        _ => msg.text.clone(),
    }
}

/// Split into IRC-sized lines. Empty segments are dropped since IRC servers
/// reject empty messages.
fn irc_lines(channel: &str, username: &str, text: &str) -> Vec<OutboundMessage> {
    split(text)
        .into_iter()
        .filter(|line| !line.is_empty())
        .map(|line| OutboundMessage::irc(channel, formatting::telegram_line(username, &line)))
        .collect()
}

/// The router with its I/O: record submission, media relay and delivery.
pub struct Bridge {
    ctx: Arc<AppContext>,
    in_flight: Arc<Semaphore>,
    max_in_flight: u32,
}

impl Bridge {
    /// `max_in_flight` is clamped to `1..=MAX_IN_FLIGHT_LIMIT`.
    pub fn new(ctx: Arc<AppContext>, max_in_flight: usize) -> Self {
        let permits = max_in_flight.clamp(1, MAX_IN_FLIGHT_LIMIT);
        Self {
            ctx,
            in_flight: Arc::new(Semaphore::new(permits)),
            max_in_flight: permits as u32,
        }
    }

    pub async fn handle_telegram(&self, mut msg: TelegramMessage) {
        if self.ctx.mapping.irc_for(msg.chat).is_some() {
            self.relay_media(&mut msg).await;
        } else {
            debug!(chat = %msg.chat, "Telegram message from unmapped chat");
        }
        let routed = route_telegram(&self.ctx.mapping, &msg);
        self.dispatch(routed).await;
    }

    /// Operator text from the console, sent to every bridged channel.
    pub async fn broadcast(&self, text: &str) {
        let record = LogRecord::builder(Tag::Console)
            .field(Utc::now().timestamp())
            .field(text)
            .finish();

        let mut outbound = Vec::new();
        for (channel, chat) in self.ctx.mapping.pairs() {
            outbound.push(OutboundMessage::irc(channel, text));
            outbound.push(OutboundMessage::telegram(chat, text, text));
        }
        self.dispatch(Routed { record, outbound }).await;
    }

    /// Status line for the audit log and the diagnostic log alike.
    pub async fn status(&self, text: &str) {
        info!("{text}");
        self.submit(LogRecord::status(Utc::now().timestamp(), text))
            .await;
    }

    /// Consume IRC events until the connection goes away.
    ///
    /// Records are submitted in arrival order. Telegram sends are handed to a
    /// courier task, so a slow Telegram never holds up the IRC reader; the
    /// courier drains its queue before this returns.
    pub async fn run_irc(self: Arc<Self>, mut events: mpsc::Receiver<IrcEvent>) {
        let (outbound, queued) = mpsc::unbounded_channel();
        let courier = tokio::spawn(Arc::clone(&self).deliver_all(queued));

        while let Some(event) = events.recv().await {
            match event {
                IrcEvent::Registered => self.status("Successfully connected to IRC!").await,
                IrcEvent::Line(line) => {
                    let routed = route_irc(&self.ctx.mapping, &line, Utc::now().timestamp());
                    if routed.outbound.is_empty() {
                        debug!(channel = %line.channel, nick = %line.nick, "IRC line from unmapped channel");
                    }
                    self.submit(routed.record).await;
                    for out in routed.outbound {
                        if outbound.send(out).is_err() {
                            warn!("Telegram courier is gone, message dropped");
                        }
                    }
                }
            }
        }
        self.status("Disconnected from IRC.").await;

        drop(outbound);
        if let Err(e) = courier.await {
            warn!("Telegram courier failed: {e}");
        }
    }

    async fn deliver_all(self: Arc<Self>, mut queued: mpsc::UnboundedReceiver<OutboundMessage>) {
        while let Some(out) = queued.recv().await {
            self.deliver(out).await;
        }
    }

    /// Consume Telegram messages, handling each on its own task.
    ///
    /// Returns once the stream has ended and every spawned task has finished.
    pub async fn run_telegram(self: Arc<Self>, mut events: mpsc::Receiver<TelegramMessage>) {
        while let Some(msg) = events.recv().await {
            let Ok(permit) = self.in_flight.clone().acquire_owned().await else {
                break;
            };
            let bridge = Arc::clone(&self);
            tokio::spawn(async move {
                bridge.handle_telegram(msg).await;
                drop(permit);
            });
        }

        // Wait for in-flight handlers so their records reach the log.
        if let Ok(all) = self.in_flight.acquire_many(self.max_in_flight).await {
            drop(all);
        }
        debug!("Telegram event stream ended");
    }

    async fn relay_media(&self, msg: &mut TelegramMessage) {
        let Some(media) = &self.ctx.media else {
            return;
        };
        let Some(file_id) = msg.attachment.as_ref().and_then(Attachment::relayable_file) else {
            return;
        };

        let data = match media.files.download(file_id).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                warn!(file_id, "downloaded empty file, sending without image");
                return;
            }
            Err(e) => {
                warn!(file_id, "file download failed, sending without image: {e}");
                return;
            }
        };

        if let Some(url) = media.images.upload(data).await {
            msg.text = if msg.caption.is_empty() {
                url
            } else {
                format!("{url} {}", msg.caption)
            };
        }
    }

    async fn dispatch(&self, routed: Routed) {
        self.submit(routed.record).await;
        for out in routed.outbound {
            self.deliver(out).await;
        }
    }

    async fn submit(&self, record: LogRecord) {
        if let Err(e) = self.ctx.log.submit(record).await {
            warn!("audit record dropped: {e}");
        }
    }

    async fn deliver(&self, out: OutboundMessage) {
        let res = match &out.destination {
            Destination::Irc(channel) => self.ctx.irc.privmsg(channel, &out.text).await,
            Destination::Telegram(chat) => match &out.fallback {
                Some(plain) => {
                    self.ctx
                        .telegram
                        .send_markdown(*chat, &out.text, plain)
                        .await
                }
                None => self.ctx.telegram.send_plain(*chat, &out.text).await,
            },
        };
        if let Err(e) = res {
            warn!(destination = ?out.destination, "send failed: {e}");
        }
    }
}
