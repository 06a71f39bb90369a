use std::collections::HashMap;

use crate::{domain::ChatId, errors::Error, Result};

/// One-to-one pairing of IRC channels and Telegram chats.
///
/// IRC channel names are matched ASCII-case-insensitively; lookups return the
/// spelling from the configuration.
#[derive(Clone, Debug, Default)]
pub struct ChannelMapping {
    by_irc: HashMap<String, (String, ChatId)>,
    by_telegram: HashMap<ChatId, String>,
}

impl ChannelMapping {
    /// Build a mapping, rejecting any IRC channel or chat that appears twice.
    pub fn new<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ChatId)>,
        S: Into<String>,
    {
        let mut mapping = Self::default();
        for (irc, chat) in pairs {
            let irc = irc.into();
            if irc.trim().is_empty() {
                return Err(Error::Mapping("empty IRC channel name".to_string()));
            }
            let key = irc.to_ascii_lowercase();
            if mapping.by_irc.contains_key(&key) {
                return Err(Error::Mapping(format!("IRC channel {irc} is mapped twice")));
            }
            if mapping.by_telegram.contains_key(&chat) {
                return Err(Error::Mapping(format!("Telegram chat {chat} is mapped twice")));
            }
            mapping.by_telegram.insert(chat, irc.clone());
            mapping.by_irc.insert(key, (irc, chat));
        }
        Ok(mapping)
    }

    /// Parse the config form, where chat ids are strings.
    pub fn from_config<'a, I>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let pairs = raw
            .into_iter()
            .map(|(irc, tg)| {
                tg.trim()
                    .parse::<i64>()
                    .map(|id| (irc.clone(), ChatId(id)))
                    .map_err(|e| {
                        Error::Mapping(format!("invalid Telegram chat id {tg:?} for {irc}: {e}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(pairs)
    }

    pub fn telegram_for(&self, irc_channel: &str) -> Option<ChatId> {
        self.by_irc
            .get(&irc_channel.to_ascii_lowercase())
            .map(|(_, chat)| *chat)
    }

    pub fn irc_for(&self, chat: ChatId) -> Option<&str> {
        self.by_telegram.get(&chat).map(String::as_str)
    }

    /// All pairs, ordered by IRC channel for stable iteration.
    pub fn pairs(&self) -> Vec<(&str, ChatId)> {
        let mut out: Vec<_> = self
            .by_irc
            .values()
            .map(|(name, chat)| (name.as_str(), *chat))
            .collect();
        out.sort();
        out
    }

    pub fn irc_channels(&self) -> Vec<&str> {
        self.pairs().into_iter().map(|(name, _)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.by_irc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_irc.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> ChannelMapping {
        ChannelMapping::new([("#general", ChatId(-100123)), ("#Dev", ChatId(-100456))]).unwrap()
    }

    #[test]
    fn lookups_work_both_ways() {
        let m = sample();
        for (irc, chat) in m.pairs() {
            assert_eq!(m.telegram_for(irc), Some(chat));
            assert_eq!(m.irc_for(chat), Some(irc));
        }
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn unknown_keys_are_not_found() {
        let m = sample();
        assert_eq!(m.telegram_for("#nope"), None);
        assert_eq!(m.irc_for(ChatId(1)), None);
        assert_eq!(ChannelMapping::default().telegram_for("#general"), None);
    }

    #[test]
    fn irc_lookup_ignores_case_but_keeps_spelling() {
        let m = sample();
        assert_eq!(m.telegram_for("#dev"), Some(ChatId(-100456)));
        assert_eq!(m.telegram_for("#GENERAL"), Some(ChatId(-100123)));
        assert_eq!(m.irc_for(ChatId(-100456)), Some("#Dev"));
    }

    #[test]
    fn duplicates_are_rejected() {
        let dup_chat = ChannelMapping::new([("#a", ChatId(1)), ("#b", ChatId(1))]);
        assert!(matches!(dup_chat, Err(Error::Mapping(_))));

        let dup_irc = ChannelMapping::new([("#a", ChatId(1)), ("#A", ChatId(2))]);
        assert!(matches!(dup_irc, Err(Error::Mapping(_))));
    }

    #[test]
    fn parses_config_form() {
        let mut raw = BTreeMap::new();
        raw.insert("#general".to_string(), "-100123".to_string());
        let m = ChannelMapping::from_config(&raw).unwrap();
        assert_eq!(m.telegram_for("#general"), Some(ChatId(-100123)));

        raw.insert("#bad".to_string(), "not-a-number".to_string());
        assert!(ChannelMapping::from_config(&raw).is_err());
    }
}
