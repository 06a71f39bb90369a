use std::sync::Arc;

use crate::{
    journal::LogSink,
    mapping::ChannelMapping,
    ports::{FileSource, ImageRelay, IrcPort, TelegramPort},
};

/// Everything the router needs, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub mapping: ChannelMapping,
    pub log: LogSink,
    pub irc: Arc<dyn IrcPort>,
    pub telegram: Arc<dyn TelegramPort>,
    /// Present when an image host is configured.
    pub media: Option<MediaRelay>,
}

/// Telegram file download plus image host upload.
#[derive(Clone)]
pub struct MediaRelay {
    pub files: Arc<dyn FileSource>,
    pub images: Arc<dyn ImageRelay>,
}
