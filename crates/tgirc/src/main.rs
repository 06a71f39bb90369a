use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tgirc_core::{
    bridge::Bridge,
    config::Config,
    context::{AppContext, MediaRelay},
    journal::{JournalConfig, LogWriter, SystemClock},
    ports::{IrcPort, TelegramPort},
    shutdown::Shutdown,
};
use tgirc_irc::IrcClient;
use tgirc_mis::MisClient;
use tgirc_telegram::{router, TelegramMessenger};

mod console;

const TELEGRAM_QUEUE: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "tgirc")]
#[command(about = "Telegram <-> IRC bridge and chat logger", version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Read operator commands and broadcasts from stdin
    #[arg(short = 'i', long)]
    stdin: bool,

    /// Echo every log record to stdout
    #[arg(short = 'o', long)]
    stdout: bool,

    /// Telegram bot token, overriding the configuration file
    #[arg(short, long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Increase diagnostic verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("tgirc: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let res = rt.block_on(run(args));
    // The stdin reader sits on a blocking thread that never returns on its own.
    rt.shutdown_timeout(Duration::from_secs(1));

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tgirc: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    tgirc_core::logging::init("tgirc", args.verbose)?;

    let cfg = Config::load(&args.config)
        .and_then(|cfg| cfg.with_token_override(args.token))
        .with_context(|| format!("loading {}", args.config.display()))?;

    let mut journal = JournalConfig::new(&cfg.log.dir);
    journal.queue_capacity = cfg.log.queue_capacity;
    journal.flush_every = cfg.log.flush_every;
    journal.echo_stdout = args.stdout;
    let writer = LogWriter::start(journal, Arc::new(SystemClock))
        .await
        .with_context(|| format!("opening log directory {}", cfg.log.dir.display()))?;
    let log_failed = writer.failed();

    let channels = cfg
        .mappings
        .irc_channels()
        .into_iter()
        .map(str::to_string)
        .collect();
    let irc = IrcClient::new(cfg.irc.clone(), channels);
    let irc_port: Arc<dyn IrcPort> = Arc::new(irc.clone());

    // 429 RetryAfter is retried inside the adapter.
    let messenger = TelegramMessenger::from_token(cfg.telegram.token.clone());
    let telegram: Arc<dyn TelegramPort> = Arc::new(messenger.clone());

    let media = match &cfg.mis {
        Some(mis) => Some(MediaRelay {
            files: Arc::new(messenger.clone()),
            images: Arc::new(MisClient::new(mis.clone())?),
        }),
        None => None,
    };

    let ctx = Arc::new(AppContext {
        mapping: cfg.mappings.clone(),
        log: writer.sink(),
        irc: irc_port.clone(),
        telegram,
        media,
    });
    let bridge = Arc::new(Bridge::new(ctx, cfg.bridge.max_in_flight));
    let shutdown = Shutdown::new(irc_port, cfg.irc.quit_message.clone(), writer);
    let producers = shutdown.producers();

    info!(pairs = cfg.mappings.len(), "starting bridge");

    match irc.connect(producers.clone()).await {
        Ok((events, reader)) => {
            shutdown.track(reader).await;
            shutdown
                .track(tokio::spawn(bridge.clone().run_irc(events)))
                .await;
        }
        Err(e) => {
            error!("IRC connection failed: {e}");
            bridge
                .status(&format!("Error connecting to IRC: {e}"))
                .await;
        }
    }

    let bot = messenger.bot();
    match router::check_connection(&bot).await {
        Ok(username) => {
            info!(%username, "Telegram bot authorized");
            bridge.status("Successfully connected to Telegram!").await;
            let (tx, rx) = mpsc::channel(TELEGRAM_QUEUE);
            shutdown
                .track(tokio::spawn(router::run_polling(bot, tx, producers.clone())))
                .await;
            shutdown
                .track(tokio::spawn(bridge.clone().run_telegram(rx)))
                .await;
        }
        Err(e) => {
            error!("Telegram connection failed: {e}");
            bridge
                .status(&format!("Error connecting to Telegram: {e}"))
                .await;
        }
    }

    let stop_requested = CancellationToken::new();
    if args.stdin {
        shutdown
            .track(tokio::spawn(console::run(
                bridge.clone(),
                stop_requested.clone(),
                producers.clone(),
            )))
            .await;
    }

    tokio::select! {
      _ = wait_for_signal() => {}
      _ = stop_requested.cancelled() => info!("stop requested from console"),
      _ = log_failed.cancelled() => error!("log writer failed, shutting down"),
    }

    shutdown.stop().await.context("closing the log")?;
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
      _ = ctrl_c => info!("received Ctrl+C, shutting down"),
      _ = terminate => info!("received terminate signal, shutting down"),
    }
}
