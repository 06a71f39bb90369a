//! Chunking of Telegram text into IRC-sized lines.
//!
//! Lengths are byte lengths, which is how IRC servers count a line.

/// Maximum payload length of a single chunk.
pub const MAX_LINE_LEN: usize = 250;

/// Split a message into lines that are safe to send as individual IRC messages.
///
/// Text containing newlines is split on them and nothing else: each segment is
/// emitted verbatim, however long it is. Longer single-line text is cut with
/// [`split_at`] until the remainder fits.
pub fn split(text: &str) -> Vec<String> {
    if text.contains('\n') {
        return text.split('\n').map(str::to_string).collect();
    }
    if text.len() <= MAX_LINE_LEN {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut rest = text;
    while rest.len() > MAX_LINE_LEN {
        let (head, tail) = split_at(rest);
        out.push(head.to_string());
        rest = tail;
    }
    out.push(rest.to_string());
    out
}

/// Cut one chunk of at most [`MAX_LINE_LEN`] bytes off the front of `s`.
///
/// Preference order: the last space in the window (consumed), then the last
/// `-`, `.` or `,` (kept on the left), then a hard cut.
pub fn split_at(s: &str) -> (&str, &str) {
    if s.len() < MAX_LINE_LEN {
        return (s, "");
    }

    let window = &s.as_bytes()[..MAX_LINE_LEN];

    if let Some(i) = window.iter().rposition(|&b| b == b' ') {
        return (&s[..i], &s[i + 1..]);
    }

    if let Some(i) = window
        .iter()
        .rposition(|&b| matches!(b, b'-' | b'.' | b','))
    {
        return s.split_at(i + 1);
    }

    // Never cut through a multi-byte character.
    let mut cut = MAX_LINE_LEN;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.split_at(cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_one_empty_line() {
        assert_eq!(split(""), vec![String::new()]);
    }

    #[test]
    fn newlines_take_precedence_over_length() {
        assert_eq!(split("a\nb"), vec!["a", "b"]);

        let long = "x".repeat(600);
        let text = format!("{long}\nshort");
        let lines = split(&text);
        assert_eq!(lines, vec![long, "short".to_string()]);
    }

    #[test]
    fn newline_split_keeps_empty_segments() {
        assert_eq!(split("a\n\nb\n"), vec!["a", "", "b", ""]);
    }

    #[test]
    fn short_text_is_untouched() {
        for len in [0, 1, 100, 249, 250] {
            let text = "word ".repeat(60)[..len].to_string();
            assert_eq!(split(&text), vec![text.clone()], "len {len}");
        }
    }

    #[test]
    fn prefers_last_space_in_window() {
        let text = format!("{} {}", "a".repeat(200), "b".repeat(100));
        let lines = split(&text);
        assert_eq!(lines, vec!["a".repeat(200), "b".repeat(100)]);
    }

    #[test]
    fn space_beyond_window_is_ignored() {
        let text = format!("{}.{} {}", "a".repeat(100), "b".repeat(200), "c".repeat(10));
        let (head, tail) = split_at(&text);
        assert_eq!(head, format!("{}.", "a".repeat(100)));
        assert_eq!(tail, format!("{} {}", "b".repeat(200), "c".repeat(10)));
    }

    #[test]
    fn punctuation_is_kept_on_the_left() {
        for p in ['-', '.', ','] {
            let text = format!("{}{p}{}", "a".repeat(120), "b".repeat(200));
            let (head, tail) = split_at(&text);
            assert_eq!(head, format!("{}{p}", "a".repeat(120)));
            assert_eq!(tail, "b".repeat(200));
        }
    }

    #[test]
    fn rightmost_punctuation_wins() {
        let text = format!("{},{}.{}", "a".repeat(50), "b".repeat(50), "c".repeat(300));
        let (head, _) = split_at(&text);
        assert_eq!(head.len(), 102);
        assert!(head.ends_with('.'));
    }

    #[test]
    fn hard_cut_at_limit() {
        let text = "x".repeat(600);
        let lines = split(&text);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 250);
        assert_eq!(lines[1].len(), 250);
        assert_eq!(lines[2].len(), 100);
        assert_eq!(lines.concat(), text);
    }

    #[test]
    fn remainder_of_exactly_limit_is_not_cut_again() {
        let text = format!("{} {}", "a".repeat(10), "b".repeat(250));
        assert_eq!(split(&text), vec!["a".repeat(10), "b".repeat(250)]);
    }

    #[test]
    fn hard_cut_respects_char_boundaries() {
        // 'é' is two bytes; 125 of them fill exactly 250 bytes, so shift by one.
        let text = format!("a{}", "é".repeat(200));
        let lines = split(&text);
        assert!(lines.iter().all(|l| l.len() <= MAX_LINE_LEN));
        assert_eq!(lines.concat(), text);
        assert_eq!(lines[0].len(), 249);
    }

    #[test]
    fn every_chunk_but_last_fits() {
        let text = "lorem ipsum dolor-sit amet, consectetur.adipiscing ".repeat(40);
        let lines = split(text.trim_end());
        let (last, init) = lines.split_last().unwrap();
        assert!(init.iter().all(|l| l.len() <= MAX_LINE_LEN));
        assert!(last.len() <= MAX_LINE_LEN);
    }

    #[test]
    fn reassembly_loses_only_consumed_spaces() {
        let text = "lorem ipsum dolor-sit amet, consectetur.adipiscing ".repeat(40);
        let text = text.trim_end();

        let mut rebuilt = String::new();
        let mut rest = text;
        while rest.len() > MAX_LINE_LEN {
            let (head, tail) = split_at(rest);
            rebuilt.push_str(head);
            let consumed = rest.len() - head.len() - tail.len();
            rebuilt.push_str(&rest[head.len()..head.len() + consumed]);
            rest = tail;
        }
        rebuilt.push_str(rest);
        assert_eq!(rebuilt, text);

        let spaces_in = text.matches(' ').count();
        let joined = split(text).concat();
        assert_eq!(joined.len(), text.len() - (spaces_in - joined.matches(' ').count()));
    }
}
