use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric, negative for groups).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Where an outbound message goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Irc(String),
    Telegram(ChatId),
}

/// A formatted message for one transport, consumed once by its send operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub destination: Destination,
    pub text: String,
    /// Plain rendering used when the transport rejects the rich-text one.
    pub fallback: Option<String>,
}

impl OutboundMessage {
    pub fn irc(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            destination: Destination::Irc(channel.into()),
            text: text.into(),
            fallback: None,
        }
    }

    pub fn telegram(chat: ChatId, markdown: impl Into<String>, plain: impl Into<String>) -> Self {
        Self {
            destination: Destination::Telegram(chat),
            text: markdown.into(),
            fallback: Some(plain.into()),
        }
    }
}
