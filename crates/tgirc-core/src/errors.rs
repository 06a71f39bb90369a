use std::path::PathBuf;

/// Core error type for the bridge.
///
/// Adapter crates map their library errors into this type so the router and
/// the binary can tell fatal failures apart from logged-and-continue ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("channel mapping error: {0}")]
    Mapping(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("log file error: {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("log writer is closed")]
    LogClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
