//! Text formatting between the two networks.

/// IRC bold control code.
const IRC_BOLD: char = '\x02';
/// IRC italics control code.
const IRC_ITALIC: char = '\x1D';

/// Escape the metacharacters of Telegram's legacy Markdown that IRC users type
/// literally, so `*stars*` and `snake_case` are not rendered as formatting.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Convert an IRC line into Telegram Markdown: literal metacharacters are
/// escaped first, then IRC bold/italics codes become Markdown delimiters.
pub fn irc_to_markdown(text: &str) -> String {
    escape_markdown(text)
        .replace(IRC_BOLD, "*")
        .replace(IRC_ITALIC, "_")
}

/// Remove IRC formatting codes for the plain-text rendering.
pub fn strip_irc_formatting(text: &str) -> String {
    text.chars()
        .filter(|&c| c != IRC_BOLD && c != IRC_ITALIC)
        .collect()
}

pub fn irc_message_markdown(nick: &str, text: &str) -> String {
    format!("*<{nick}>* {}", irc_to_markdown(text))
}

pub fn irc_message_plain(nick: &str, text: &str) -> String {
    format!("<{nick}> {}", strip_irc_formatting(text))
}

pub fn irc_action_markdown(nick: &str, text: &str) -> String {
    format!("*★ {nick}* {}", irc_to_markdown(text))
}

pub fn irc_action_plain(nick: &str, text: &str) -> String {
    format!("★ {nick} {}", strip_irc_formatting(text))
}

/// One IRC line relayed from Telegram.
pub fn telegram_line(username: &str, line: &str) -> String {
    format!("<{username}> {line}")
}

pub fn forwarded(text: &str, origin: &str) -> String {
    format!("[fwd from {origin}] {text}")
}

pub fn reply(text: &str, origin: &str) -> String {
    format!("[reply to {origin}] {text}")
}

pub fn location_url(latitude: f64, longitude: f64) -> String {
    format!(
        "https://maps.google.com/maps?q={latitude:.6},{longitude:.6}&ll={latitude:.6},{longitude:.6}&z=16"
    )
}

pub fn contact(first_name: &str, last_name: &str, phone: &str) -> String {
    format!("{first_name} {last_name} ({phone})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markdown_metacharacters() {
        assert_eq!(escape_markdown("hello *world*"), "hello \\*world\\*");
        assert_eq!(escape_markdown("snake_case"), "snake\\_case");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn irc_formatting_becomes_markdown() {
        assert_eq!(irc_to_markdown("\x02bold\x02 and \x1Dit\x1D"), "*bold* and _it_");
        assert_eq!(irc_to_markdown("\x02a*b\x02"), "*a\\*b*");
    }

    #[test]
    fn message_formats() {
        assert_eq!(
            irc_message_markdown("alice", "hello *world*"),
            "*<alice>* hello \\*world\\*"
        );
        assert_eq!(irc_message_plain("alice", "\x02hi\x02"), "<alice> hi");
        assert_eq!(irc_action_markdown("bob", "waves"), "*★ bob* waves");
        assert_eq!(irc_action_plain("bob", "waves"), "★ bob waves");
        assert_eq!(telegram_line("carol", "hey"), "<carol> hey");
    }

    #[test]
    fn origin_prefixes() {
        assert_eq!(forwarded("text", "dave"), "[fwd from dave] text");
        assert_eq!(reply("text", "erin"), "[reply to erin] text");
    }

    #[test]
    fn location_and_contact() {
        assert_eq!(
            location_url(60.1699, 24.9384),
            "https://maps.google.com/maps?q=60.169900,24.938400&ll=60.169900,24.938400&z=16"
        );
        assert_eq!(contact("Ada", "Lovelace", "+44 1"), "Ada Lovelace (+44 1)");
    }
}
