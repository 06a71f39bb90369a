//! Audit log records.
//!
//! One record is one line: `TAG>field|field|...`, with `§` separating the
//! primary field group from a nested one (forward or reply origin).

use std::fmt;

/// Separates fields within a group.
pub const FIELD_SEP: char = '|';
/// Separates the primary group from a nested one.
pub const GROUP_SEP: char = '§';

/// Record type tag, written before the `>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Message,
    Forward,
    Reply,
    Location,
    Contact,
    Join,
    Leave,
    Data,
    UnmappedTelegram,
    IrcMessage,
    IrcAction,
    UnmappedIrc,
    Console,
    Status,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Message => "MESSAGE",
            Tag::Forward => "FORWARD",
            Tag::Reply => "REPLY",
            Tag::Location => "LOCATION",
            Tag::Contact => "CONTACT",
            Tag::Join => "JOIN",
            Tag::Leave => "LEAVE",
            Tag::Data => "DATA",
            Tag::UnmappedTelegram => "UTGMESSAGE",
            Tag::IrcMessage => "IRCMESSAGE",
            Tag::IrcAction => "IRCACTION",
            Tag::UnmappedIrc => "UIRCMESSAGE",
            Tag::Console => "CONSOLE",
            Tag::Status => "STATUS",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished, newline-terminated audit line.
#[derive(Clone, PartialEq, Eq)]
pub struct LogRecord(Vec<u8>);

impl LogRecord {
    pub fn builder(tag: Tag) -> RecordBuilder {
        RecordBuilder::new(tag)
    }

    /// A free-form status line (connects, disconnects, console notices).
    pub fn status(timestamp: i64, text: &str) -> Self {
        Self::builder(Tag::Status).field(timestamp).field(text).finish()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogRecord")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

/// Builds a [`LogRecord`] field by field.
///
/// Embedded line breaks are written as the two characters `\n` (and `\r`) so a
/// record never spans more than one line of the file.
#[derive(Debug)]
pub struct RecordBuilder {
    buf: String,
    fields_in_group: usize,
}

impl RecordBuilder {
    fn new(tag: Tag) -> Self {
        let mut buf = String::with_capacity(128);
        buf.push_str(tag.as_str());
        buf.push('>');
        Self {
            buf,
            fields_in_group: 0,
        }
    }

    pub fn field(mut self, value: impl fmt::Display) -> Self {
        if self.fields_in_group > 0 {
            self.buf.push(FIELD_SEP);
        }
        self.fields_in_group += 1;

        let value = value.to_string();
        for c in value.chars() {
            match c {
                '\n' => self.buf.push_str("\\n"),
                '\r' => self.buf.push_str("\\r"),
                c => self.buf.push(c),
            }
        }
        self
    }

    /// Start the nested field group.
    pub fn group(mut self) -> Self {
        self.buf.push(GROUP_SEP);
        self.fields_in_group = 0;
        self
    }

    pub fn finish(mut self) -> LogRecord {
        self.buf.push('\n');
        LogRecord(self.buf.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(r: &LogRecord) -> String {
        String::from_utf8(r.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn fields_are_pipe_delimited() {
        let r = LogRecord::builder(Tag::IrcMessage)
            .field(1_700_000_000)
            .field("#general")
            .field("alice")
            .field("hello")
            .finish();
        assert_eq!(text(&r), "IRCMESSAGE>1700000000|#general|alice|hello\n");
    }

    #[test]
    fn nested_group_uses_secondary_delimiter() {
        let r = LogRecord::builder(Tag::Forward)
            .field(1)
            .field("text")
            .group()
            .field(2)
            .field("bob")
            .finish();
        assert_eq!(text(&r), "FORWARD>1|text§2|bob\n");
    }

    #[test]
    fn line_breaks_are_escaped() {
        let r = LogRecord::builder(Tag::Message)
            .field("a\nb\r\nc")
            .finish();
        assert_eq!(text(&r), "MESSAGE>a\\nb\\r\\nc\n");
        assert_eq!(r.as_bytes().iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn status_record() {
        let r = LogRecord::status(5, "Successfully connected to IRC!");
        assert_eq!(text(&r), "STATUS>5|Successfully connected to IRC!\n");
    }
}
