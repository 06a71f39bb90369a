//! Just enough of the IRC line protocol (RFC 1459 framing) for a bot.

/// CTCP delimiter.
pub const CTCP: char = '\x01';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// `nick!user@host` or a server name, without the leading `:`.
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Parse one line, with or without its trailing CRLF.
    ///
    /// Returns `None` for blank lines and lines without a command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        // IRCv3 tags are not requested, but skip them if a server sends some.
        if rest.starts_with('@') {
            rest = rest.split_once(' ')?.1;
        }

        let prefix = match rest.strip_prefix(':') {
            Some(p) => {
                let (prefix, tail) = p.split_once(' ')?;
                rest = tail;
                Some(prefix.to_string())
            }
            None => None,
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nick part of the prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        (!nick.is_empty()).then_some(nick)
    }

    pub fn param(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }
}

/// A CTCP request embedded in a PRIVMSG body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ctcp<'a> {
    Action(&'a str),
    Version,
    Other(&'a str),
}

/// Split a PRIVMSG body into a CTCP request, if it is one.
pub fn parse_ctcp(body: &str) -> Option<Ctcp<'_>> {
    let inner = body.strip_prefix(CTCP)?;
    let inner = inner.strip_suffix(CTCP).unwrap_or(inner);
    let (verb, arg) = inner.split_once(' ').unwrap_or((inner, ""));
    Some(match verb.to_ascii_uppercase().as_str() {
        "ACTION" => Ctcp::Action(arg),
        "VERSION" => Ctcp::Version,
        _ => Ctcp::Other(verb),
    })
}

/// Replace line breaks so user text cannot inject extra commands.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

pub fn nick(nick: &str) -> String {
    format!("NICK {nick}\r\n")
}

pub fn user(user: &str, realname: &str) -> String {
    format!("USER {user} 0 * :{realname}\r\n")
}

pub fn join(channel: &str) -> String {
    format!("JOIN {channel}\r\n")
}

pub fn pong(token: &str) -> String {
    format!("PONG :{token}\r\n")
}

pub fn privmsg(target: &str, text: &str) -> String {
    format!("PRIVMSG {target} :{}\r\n", sanitize(text))
}

pub fn notice(target: &str, text: &str) -> String {
    format!("NOTICE {target} :{}\r\n", sanitize(text))
}

pub fn quit(message: &str) -> String {
    format!("QUIT :{}\r\n", sanitize(message))
}
