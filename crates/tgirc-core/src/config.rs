use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    errors::Error,
    journal::{DEFAULT_FLUSH_EVERY, DEFAULT_QUEUE_CAPACITY},
    mapping::ChannelMapping,
    Result,
};

pub const DEFAULT_QUIT_MESSAGE: &str = "Bridge/logbot shutting down...";
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;
/// Upper bound for `bridge.max_in_flight`.
pub const MAX_IN_FLIGHT_LIMIT: usize = 4096;

/// Typed configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub mappings: ChannelMapping,
    pub telegram: TelegramConfig,
    pub irc: IrcConfig,
    pub mis: Option<MisConfig>,
    pub log: LogConfig,
    pub bridge: BridgeConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IrcConfig {
    pub address: String,
    #[serde(default)]
    pub user: String,
    pub nick: String,
    /// NickServ password; empty means no identification.
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
}

/// Image host used to relay Telegram photos to IRC as links.
#[derive(Clone, Debug, Deserialize)]
pub struct MisConfig {
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BridgeConfig {
    /// Upper bound on Telegram messages being handled at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    mappings: BTreeMap<String, String>,
    telegram: TelegramConfig,
    irc: IrcConfig,
    #[serde(default)]
    mis: Option<MisConfig>,
    #[serde(default)]
    log: LogConfig,
    #[serde(default)]
    bridge: BridgeConfig,
}

impl Config {
    /// Load `path`, applying `.env` and environment overrides for secrets.
    pub fn load(path: &Path) -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(data)
            .map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        Self::from_raw(raw)
    }

    fn from_raw(mut raw: RawConfig) -> Result<Self> {
        if let Some(token) = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty) {
            raw.telegram.token = token;
        }
        if let Some(password) = env_str("IRC_PASSWORD").and_then(non_empty) {
            raw.irc.password = password;
        }
        if let Some(mis) = raw.mis.as_mut() {
            if let Some(password) = env_str("MIS_PASSWORD").and_then(non_empty) {
                mis.password = password;
            }
        }
        if let Some(dir) = env_path("TGIRC_LOG_DIR") {
            raw.log.dir = dir;
        }

        // Treat an empty image host as "not configured".
        let mis = raw.mis.filter(|m| !m.address.trim().is_empty()).map(|mut m| {
            m.address = m.address.trim_end_matches('/').to_string();
            m
        });

        if raw.irc.address.trim().is_empty() {
            return Err(Error::Config("irc.address is required".to_string()));
        }
        if raw.irc.nick.trim().is_empty() {
            return Err(Error::Config("irc.nick is required".to_string()));
        }
        if raw.irc.user.trim().is_empty() {
            raw.irc.user = raw.irc.nick.clone();
        }

        if !(1..=MAX_IN_FLIGHT_LIMIT).contains(&raw.bridge.max_in_flight) {
            return Err(Error::Config(format!(
                "bridge.max_in_flight must be between 1 and {MAX_IN_FLIGHT_LIMIT}, got {}",
                raw.bridge.max_in_flight
            )));
        }

        let mappings = ChannelMapping::from_config(&raw.mappings)?;

        Ok(Self {
            mappings,
            telegram: raw.telegram,
            irc: raw.irc,
            mis,
            log: raw.log,
            bridge: raw.bridge,
        })
    }

    /// Apply a command-line token and check that one is present.
    pub fn with_token_override(mut self, token: Option<String>) -> Result<Self> {
        if let Some(token) = token.and_then(non_empty) {
            self.telegram.token = token;
        }
        if self.telegram.token.trim().is_empty() {
            return Err(Error::Config(
                "telegram.token (or TELEGRAM_BOT_TOKEN) is required".to_string(),
            ));
        }
        Ok(self)
    }
}

fn default_quit_message() -> String {
    DEFAULT_QUIT_MESSAGE.to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_flush_every() -> usize {
    DEFAULT_FLUSH_EVERY
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatId;

    const FULL: &str = r##"{
        "mappings": { "#general": "-100123", "#dev": "-100456" },
        "telegram": { "token": "123:abc" },
        "irc": {
            "address": "irc.example.org:6697",
            "user": "bridge",
            "nick": "tgbridge",
            "password": "hunter2",
            "tls": true
        },
        "mis": { "address": "https://img.example.org/", "username": "u", "password": "p" },
        "log": { "dir": "/var/log/tgirc", "flush_every": 10 },
        "bridge": { "max_in_flight": 8 }
    }"##;

    #[test]
    fn parses_full_config() {
        let cfg = Config::from_json(FULL).unwrap();
        assert_eq!(cfg.mappings.telegram_for("#general"), Some(ChatId(-100123)));
        assert_eq!(cfg.mappings.irc_for(ChatId(-100456)), Some("#dev"));
        assert_eq!(cfg.irc.nick, "tgbridge");
        assert!(cfg.irc.tls);
        assert_eq!(cfg.irc.quit_message, DEFAULT_QUIT_MESSAGE);
        assert_eq!(cfg.mis.as_ref().unwrap().address, "https://img.example.org");
        assert_eq!(cfg.log.dir, PathBuf::from("/var/log/tgirc"));
        assert_eq!(cfg.log.flush_every, 10);
        assert_eq!(cfg.log.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(cfg.bridge.max_in_flight, 8);
    }

    #[test]
    fn optional_sections_default() {
        let cfg = Config::from_json(
            r##"{
                "mappings": { "#general": "-100123" },
                "telegram": {},
                "irc": { "address": "irc.example.org:6667", "nick": "tg" }
            }"##,
        )
        .unwrap();
        assert!(cfg.mis.is_none());
        assert_eq!(cfg.irc.user, "tg");
        assert!(!cfg.irc.tls);
        assert_eq!(cfg.log.flush_every, DEFAULT_FLUSH_EVERY);
        assert_eq!(cfg.bridge.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
    }

    #[test]
    fn empty_image_host_means_disabled() {
        let cfg = Config::from_json(
            r##"{
                "telegram": { "token": "t" },
                "irc": { "address": "a:1", "nick": "n" },
                "mis": { "address": "" }
            }"##,
        )
        .unwrap();
        assert!(cfg.mis.is_none());
    }

    #[test]
    fn token_is_required_after_overrides() {
        let cfg = Config::from_json(
            r##"{ "telegram": {}, "irc": { "address": "a:1", "nick": "n" } }"##,
        )
        .unwrap();
        if env::var_os("TELEGRAM_BOT_TOKEN").is_none() {
            assert!(cfg.clone().with_token_override(None).is_err());
        }
        let cfg = cfg.with_token_override(Some("42:xyz".to_string())).unwrap();
        assert_eq!(cfg.telegram.token, "42:xyz");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(Config::from_json("{"), Err(Error::Config(_))));
        assert!(Config::from_json(r##"{ "telegram": {}, "irc": { "address": "", "nick": "n" } }"##).is_err());
        assert!(matches!(
            Config::from_json(
                r##"{
                    "mappings": { "#a": "1", "#b": "1" },
                    "telegram": {},
                    "irc": { "address": "a:1", "nick": "n" }
                }"##
            ),
            Err(Error::Mapping(_))
        ));
    }

    #[test]
    fn max_in_flight_must_be_in_range() {
        let with = |n: u64| {
            Config::from_json(&format!(
                r##"{{
                    "telegram": {{}},
                    "irc": {{ "address": "a:1", "nick": "n" }},
                    "bridge": {{ "max_in_flight": {n} }}
                }}"##
            ))
        };
        assert!(matches!(with(0), Err(Error::Config(_))));
        assert!(matches!(with(1 << 32), Err(Error::Config(_))));
        assert!(matches!(with(MAX_IN_FLIGHT_LIMIT as u64 + 1), Err(Error::Config(_))));
        assert_eq!(with(1).unwrap().bridge.max_in_flight, 1);
        assert_eq!(
            with(MAX_IN_FLIGHT_LIMIT as u64).unwrap().bridge.max_in_flight,
            MAX_IN_FLIGHT_LIMIT
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let res = Config::load(Path::new("/nonexistent/tgirc/config.json"));
        assert!(matches!(res, Err(Error::Config(_))));
    }
}
