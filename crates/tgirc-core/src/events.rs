//! Inbound events, as delivered by the transport adapters.
//!
//! Library-specific types stay in the adapter crates; these are the shapes the
//! router works with.

use crate::domain::{ChatId, MessageId, UserId};

/// Sender or subject of a Telegram update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelegramUser {
    pub id: UserId,
    /// `@username` without the `@`, or the first name when the user has none.
    pub username: String,
}

impl TelegramUser {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            username: username.into(),
        }
    }
}

/// Non-text payload of a message.
#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    Photo { file_id: String },
    Sticker { file_id: String },
    Audio,
    Video,
    Document { file_id: String, mime: String },
    Location { latitude: f64, longitude: f64 },
    Contact {
        first_name: String,
        last_name: String,
        phone: String,
    },
}

impl Attachment {
    /// File id of media that can be relayed to an image host.
    pub fn relayable_file(&self) -> Option<&str> {
        match self {
            Attachment::Photo { file_id } | Attachment::Sticker { file_id } => Some(file_id),
            Attachment::Document { file_id, mime } if mime == "image/gif" => Some(file_id),
            _ => None,
        }
    }
}

/// Where a message came from when it is not original content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    Forward {
        sender: TelegramUser,
        timestamp: i64,
    },
    Reply {
        id: MessageId,
        timestamp: i64,
        sender: TelegramUser,
        text: String,
    },
}

/// Group service messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceEvent {
    Joined(TelegramUser),
    Left(TelegramUser),
    TitleChanged(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TelegramMessage {
    pub chat: ChatId,
    pub id: MessageId,
    /// Unix seconds.
    pub timestamp: i64,
    pub sender: TelegramUser,
    /// Message text. May be empty.
    pub text: String,
    /// Caption of a media message. May be empty.
    pub caption: String,
    pub attachment: Option<Attachment>,
    pub origin: Option<Origin>,
    pub service: Option<ServiceEvent>,
}

impl TelegramMessage {
    pub fn text(chat: ChatId, id: i32, timestamp: i64, sender: TelegramUser, text: &str) -> Self {
        Self {
            chat,
            id: MessageId(id),
            timestamp,
            sender,
            text: text.to_string(),
            caption: String::new(),
            attachment: None,
            origin: None,
            service: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrcLineKind {
    Message,
    Action,
}

/// A PRIVMSG or CTCP ACTION seen on IRC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrcLine {
    /// Target of the PRIVMSG: a channel, or our own nick for private queries.
    pub channel: String,
    pub nick: String,
    pub text: String,
    pub kind: IrcLineKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IrcEvent {
    /// Registration finished (`001`) and channels were joined.
    Registered,
    Line(IrcLine),
}
