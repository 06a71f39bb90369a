use crate::{errors::Error, Result};

/// Initialize diagnostic logging for the bridge.
///
/// Diagnostics go to stderr; the audit trail lives in the daily log files and
/// may be echoed to stdout, so the two never interleave on one stream.
pub fn init(service_name: &str, verbosity: u8) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{service_name}={level},tgirc_core={level},tgirc_irc={level},tgirc_telegram={level},tgirc_mis={level}"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("failed to install tracing subscriber: {e}")))
}
